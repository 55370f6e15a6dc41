use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Environment variable overriding the route storage file
pub const STORE_ENV: &str = "GRAVEL_ROUTE_STORE";

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Gravel Route - measure, convert and store gravel-bike routes
pub struct Settings {
    /// Enable debug logging (overridden by RUST_LOG)
    #[clap(short, long, global = true)]
    pub verbose: bool,

    /// Route storage file (defaults to the per-user config directory)
    #[clap(long, global = true, value_name = "PATH", env = STORE_ENV)]
    pub store: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Show segment distances, total, loop state and distance markers of a route file
    Info {
        /// GPX or GeoJSON file
        file: PathBuf,

        /// Distance marker spacing in kilometers
        #[clap(short, long, default_value = "1.0")]
        interval_km: f64,
    },

    /// Convert a route between GPX and GeoJSON (format taken from the extensions)
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// Route name to embed (defaults to the name found in the input)
        #[clap(short, long)]
        name: Option<String>,
    },

    /// Import a route file into the route library
    Save {
        file: PathBuf,

        /// Name to save the route under
        #[clap(short, long)]
        name: String,
    },

    /// List saved routes
    List,

    /// Export a saved route to a GPX or GeoJSON file
    Export { name: String, output: PathBuf },

    /// Delete a saved route
    Delete { name: String },
}

impl Settings {
    /// Parse the process arguments, exiting with usage on error
    pub fn from_cli() -> Self {
        match Self::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_info_defaults() {
        let settings = Settings::try_parse_from(["gravel-route", "info", "ride.gpx"]).unwrap();
        assert!(!settings.verbose);
        match settings.command {
            Command::Info { file, interval_km } => {
                assert_eq!(file, PathBuf::from("ride.gpx"));
                assert_eq!(interval_km, 1.0);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let settings = Settings::try_parse_from([
            "gravel-route",
            "list",
            "--verbose",
            "--store",
            "/tmp/routes.json",
        ])
        .unwrap();
        assert!(settings.verbose);
        assert_eq!(settings.store, Some(PathBuf::from("/tmp/routes.json")));
        assert!(matches!(settings.command, Command::List));
    }

    #[test]
    fn test_convert_with_name() {
        let settings = Settings::try_parse_from([
            "gravel-route",
            "convert",
            "in.gpx",
            "out.geojson",
            "--name",
            "Forest loop",
        ])
        .unwrap();
        match settings.command {
            Command::Convert {
                input,
                output,
                name,
            } => {
                assert_eq!(input, PathBuf::from("in.gpx"));
                assert_eq!(output, PathBuf::from("out.geojson"));
                assert_eq!(name.as_deref(), Some("Forest loop"));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_save_requires_name() {
        assert!(Settings::try_parse_from(["gravel-route", "save", "ride.gpx"]).is_err());
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Settings::try_parse_from(["gravel-route"]).is_err());
    }
}
