mod app;
mod graph;
mod util;

use std::path::PathBuf;

use anyhow::{Context, anyhow};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use graph::{EvictionPolicy, GraphConfig};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// JSON file with graph options; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Id of the node the graph starts from.
    #[arg(long)]
    initial_node: Option<String>,

    /// Where node data lives; `[%id%]` is replaced by the node id.
    #[arg(long, default_value = "./demo-data/[%id%].json")]
    data_url: String,

    #[arg(long)]
    distance: Option<f64>,

    /// Animation length in milliseconds.
    #[arg(long)]
    move_time: Option<f64>,

    #[arg(long)]
    angle_limit: Option<f64>,

    /// Fix the angle of the root's first child instead of picking one at random.
    #[arg(long)]
    start_angle: Option<f64>,

    #[arg(long)]
    no_return_to_parent: bool,

    /// Do not expand nodes automatically after they are selected.
    #[arg(long)]
    no_children: bool,

    #[arg(long, value_enum)]
    eviction: Option<EvictionPolicy>,

    /// Leave children of off-trail siblings on screen.
    #[arg(long)]
    keep_siblings: bool,

    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn graph_config(&self) -> anyhow::Result<GraphConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                serde_json::from_str::<GraphConfig>(&text)
                    .with_context(|| format!("failed to parse {}", path.display()))?
            }
            None => GraphConfig::default(),
        };

        if let Some(id) = &self.initial_node {
            config.initial_node_id = id.clone();
        }
        if let Some(distance) = self.distance {
            config.distance_nodes = distance;
        }
        if let Some(move_time) = self.move_time {
            config.move_time = move_time;
        }
        if let Some(angle_limit) = self.angle_limit {
            config.angle_limit = angle_limit;
        }
        if self.start_angle.is_some() {
            config.start_angle = self.start_angle;
        }
        if self.no_return_to_parent {
            config.return_to_parent = false;
        }
        if self.no_children {
            config.show_children = false;
        }
        if let Some(eviction) = self.eviction {
            config.eviction = eviction;
        }
        if self.keep_siblings {
            config.prune_off_trail = false;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }

        config.validate().context("invalid graph options")?;
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trail_graph=info")),
        )
        .init();

    let args = Args::parse();
    let config = args.graph_config()?;
    let data_url = args.data_url.clone();
    tracing::info!(initial = %config.initial_node_id, %data_url, "starting");

    let options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default().with_inner_size([1440.0, 920.0]),
        ..Default::default()
    };

    eframe::run_native(
        "trail-graph",
        options,
        Box::new(move |cc| Ok(Box::new(app::TrailGraphApp::new(cc, config, data_url)))),
    )
    .map_err(|error| anyhow!("window failed: {error}"))
}
