use anyhow::{anyhow, bail};
use tracing::info;

use wadas_core::{PolicyKind, SchedulerConfig, Stage, parse_duration};
use wadas_metrics::MetricsClient;
use wadas_placement::build_policy;
use wadas_scheduler::{Scheduler, SchedulingResult};

pub async fn run(
    config: &SchedulerConfig,
    kind: PolicyKind,
    every: Option<&str>,
    format: &str,
    ranking: bool,
) -> anyhow::Result<()> {
    let scheduler = Scheduler::from_config(config, super::inventory(config), MetricsClient::http()?);
    let policy = build_policy(kind, config);

    let Some(every) = every else {
        let result = scheduler.select(policy.as_ref()).await;
        print_result(&result, format, ranking)?;
        if !result.is_complete() {
            bail!("at least one stage could not be placed");
        }
        return Ok(());
    };

    let period = parse_duration(every).ok_or_else(|| anyhow!("invalid interval: {every}"))?;
    if period.is_zero() {
        bail!("interval must be greater than zero");
    }
    info!(policy = %kind, interval = ?period, "periodic selection started");

    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let result = scheduler.select(policy.as_ref()).await;
                print_result(&result, format, ranking)?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping");
                break;
            }
        }
    }
    Ok(())
}

fn print_result(result: &SchedulingResult, format: &str, ranking: bool) -> anyhow::Result<()> {
    match format {
        "json" => {
            println!("{}", serde_json::to_string(&result.report())?);
        }
        _ => {
            print!("{result}");
            if ranking {
                for stage in Stage::ALL {
                    println!("{stage} ranking:");
                    for (i, a) in result.ranking(stage).iter().enumerate() {
                        println!("  {}. {a}", i + 1);
                    }
                }
            }
        }
    }
    Ok(())
}
