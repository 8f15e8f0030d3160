use std::collections::{BTreeMap, HashSet};

use wadas_core::SchedulerConfig;
use wadas_metrics::{MetricsClient, render_exposition};

pub async fn run(
    config: &SchedulerConfig,
    url: &str,
    metrics: &[String],
    format: &str,
) -> anyhow::Result<()> {
    let client = MetricsClient::http()?;
    let timeout = config.scheduler.scrape_timeout();

    let snapshot = if metrics.is_empty() {
        client.scrape_all(url, timeout).await?
    } else {
        let targets: HashSet<String> = metrics.iter().cloned().collect();
        client.try_scrape(url, &targets, timeout).await?
    };

    match format {
        "json" => {
            let values: BTreeMap<&str, f64> = snapshot.iter().collect();
            println!("{}", serde_json::to_string_pretty(&values)?);
        }
        "prom" => print!("{}", render_exposition(&snapshot)),
        _ => {
            for (name, value) in snapshot.iter() {
                println!("{name} {value}");
            }
        }
    }
    Ok(())
}
