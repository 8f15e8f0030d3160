use wadas_cluster::NodeDirectory;
use wadas_core::SchedulerConfig;

pub async fn run(config: &SchedulerConfig, format: &str) -> anyhow::Result<()> {
    let nodes = NodeDirectory::new(super::inventory(config)).list_nodes().await;

    match format {
        "json" => {
            let list: Vec<_> = nodes.values().collect();
            println!("{}", serde_json::to_string_pretty(&list)?);
        }
        _ => {
            if nodes.is_empty() {
                println!("no alive nodes");
                return Ok(());
            }
            for node in nodes.values() {
                let resources: Vec<String> = node
                    .resources
                    .iter()
                    .map(|(name, capacity)| format!("{name}={capacity}"))
                    .collect();
                println!(
                    "{:<20} {:<16} {:>6}  {}",
                    node.id,
                    node.ip,
                    node.metrics_port,
                    resources.join(" ")
                );
            }
        }
    }
    Ok(())
}
