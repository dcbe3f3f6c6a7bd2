use clap::{Parser, Subcommand};

use crate::domain::Region;

#[derive(Parser)]
#[command(name = "tierwatch")]
#[command(version = "0.1.0")]
#[command(about = "Event ranking cutoff tracker and final-score forecaster", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config directory (default.toml plus $TIERWATCH_ENV overrides)
    #[arg(short, long, default_value = "config")]
    pub config_dir: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Track one tier of an event
    Track {
        /// Tier (rank threshold) to track
        #[arg(short, long)]
        tier: u32,
        /// Region code, id or full name (default: first region in priority with a current event)
        #[arg(short, long)]
        region: Option<Region>,
        /// Event id (default: the region's current event)
        #[arg(short, long)]
        event: Option<i64>,
        /// Include chart series in the output
        #[arg(long)]
        chart: bool,
        /// Rebase the chart series to zero time and score
        #[arg(long, requires = "chart")]
        zero_baseline: bool,
    },
    /// Track every tier the region records for an event
    Tiers {
        #[arg(short, long)]
        region: Option<Region>,
        #[arg(short, long)]
        event: Option<i64>,
    },
    /// Show the region's current event
    Present {
        #[arg(short, long)]
        region: Option<Region>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_track_command() {
        let cli = Cli::try_parse_from([
            "tierwatch", "track", "--tier", "1000", "--region", "cn", "--event", "215", "--chart",
        ])
        .unwrap();
        match cli.command {
            Commands::Track {
                tier,
                region,
                event,
                chart,
                zero_baseline,
            } => {
                assert_eq!(tier, 1000);
                assert_eq!(region, Some(Region::Cn));
                assert_eq!(event, Some(215));
                assert!(chart);
                assert!(!zero_baseline);
            }
            _ => panic!("expected track command"),
        }
        assert_eq!(cli.config_dir, "config");
    }

    #[test]
    fn test_zero_baseline_requires_chart() {
        assert!(Cli::try_parse_from(["tierwatch", "track", "-t", "100", "--zero-baseline"]).is_err());
    }

    #[test]
    fn test_bad_region_rejected() {
        assert!(Cli::try_parse_from(["tierwatch", "present", "--region", "mars"]).is_err());
    }
}
