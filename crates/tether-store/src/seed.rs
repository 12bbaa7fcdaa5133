//! Deterministic demo data
//!
//! Seeding uses a ChaCha RNG so the same profile always produces the same
//! store, which keeps demo output and snapshot tests stable.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tether_core::{ClientStatus, NewClient, NewFile, Result, SeedProfile};

use crate::tables::Tables;

const NAMES: &[&str] = &[
    "Acme", "Globex", "Initech", "Umbrella", "Hooli", "Stark", "Wayne", "Tyrell",
];

/// Populate `tables` according to `profile`, stamping everything with `now`.
pub(crate) fn apply(tables: &mut Tables, profile: &SeedProfile, now: u64) -> Result<()> {
    let SeedProfile::Demo {
        clients,
        files_per_client,
        seed,
    } = *profile
    else {
        return Ok(());
    };

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for i in 0..clients {
        let base = NAMES[i as usize % NAMES.len()];
        let status = match rng.gen_range(0..3) {
            0 => ClientStatus::Registered,
            1 => ClientStatus::Connected,
            _ => ClientStatus::Offline,
        };
        let client_id = format!("demo-client-{i}");
        tables.insert_client(
            NewClient::named(format!("{base} {i}"))
                .with_id(client_id.clone())
                .with_status(status),
            now,
        )?;

        for j in 0..files_per_client {
            let mut file = NewFile::sized(rng.gen_range(1_024..=64 * 1_024 * 1_024))
                .with_id(format!("demo-file-{i}-{j}"))
                .with_name(format!("backup-{i}-{j}.tar"));
            if rng.gen_bool(0.7) {
                file = file.verified();
            }
            tables.insert_file(&client_id, file, now)?;
        }
    }
    Ok(())
}
