#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use salon_queue::application::engine::SalonEngine;
use salon_queue::config::Settings;
use salon_queue::domain::ports::{ManualClock, SharedEventSink, SharedStore};
use salon_queue::infrastructure::events::NullEventSink;
use std::fs::File;
use std::io::Error;
use std::path::Path;
use std::sync::Arc;

pub const HEADER: [&str; 9] = [
    "op", "actor", "salon", "target", "value", "date", "time", "services", "at",
];

pub const START: &str = "2026-03-02T09:00:00Z";

pub fn settings() -> Settings {
    Settings::load("tests/fixtures/salons.toml").expect("fixture settings")
}

/// An engine over `store` with the fixture salon registered, a null event
/// sink and a manual clock at [`START`].
pub async fn engine(store: SharedStore) -> (SalonEngine, Arc<ManualClock>) {
    engine_with_events(store, Arc::new(NullEventSink)).await
}

pub async fn engine_with_events(
    store: SharedStore,
    events: SharedEventSink,
) -> (SalonEngine, Arc<ManualClock>) {
    let settings = settings();
    let clock = Arc::new(ManualClock::new(START.parse().unwrap()));
    let engine = SalonEngine::new(store, events, clock.clone(), &settings);
    for profile in &settings.salons {
        engine.register(profile).await.unwrap();
    }
    (engine, clock)
}

/// Writes a script of `rows` random queue commands for a handful of
/// customers, one minute apart, ending with a sweep and a snapshot.
pub fn generate_script(path: &Path, rows: usize, seed: u64) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    let mut rng = StdRng::seed_from_u64(seed);
    let start: chrono::DateTime<chrono::Utc> = START.parse().unwrap();

    wtr.write_record(HEADER)?;

    for i in 0..rows {
        let customer = format!("c{}", rng.gen_range(0..8));
        let at = (start + chrono::TimeDelta::minutes(i as i64)).to_rfc3339();
        let ticket = format!("{customer}-ticket");
        let record: [&str; 9] = match rng.gen_range(0..10) {
            0..=4 => ["checkin", &customer, "downtown", &ticket, "", "", "", "", &at],
            5..=7 => ["checkout", &customer, "downtown", &ticket, "", "", "", "", &at],
            _ => ["adjust", "desk", "downtown", "", "-1", "", "", "", &at],
        };
        wtr.write_record(record)?;
    }

    let end = (start + chrono::TimeDelta::minutes(rows as i64 + 300)).to_rfc3339();
    wtr.write_record(["sweep", "", "", "", "", "", "", "", &end])?;
    wtr.write_record(["snapshot", "", "downtown", "", "", "", "", "", ""])?;
    wtr.flush()?;
    Ok(())
}
