use std::{collections::BTreeMap, time::Duration};

#[derive(Default)]
pub struct Statistics {
    pile: BTreeMap<&'static str, Vec<Duration>>,
}

impl Statistics {
    pub fn add(&mut self, kind: &'static str, latency: Duration) {
        self.pile.entry(kind).or_default().push(latency);
    }

    pub fn display(&mut self) {
        println!("\n - - - - - - - - - - - - - - - - - - - - - - - - - - - -");
        println!(
            "{:<14}{:>8}{:>12}{:>12}{:>12}{:>12}",
            "kind", "count", "min, us", "avg, us", "p99, us", "max, us"
        );
        for (kind, latencies) in &mut self.pile {
            latencies.sort_unstable();
            let count = latencies.len();
            let total: Duration = latencies.iter().sum();
            let p99 = latencies[(count * 99 / 100).min(count - 1)];
            println!(
                "{:<14}{:>8}{:>12}{:>12}{:>12}{:>12}",
                kind,
                count,
                latencies[0].as_micros(),
                (total / count as u32).as_micros(),
                p99.as_micros(),
                latencies[count - 1].as_micros()
            );
        }
    }
}
