use clap::Parser;
use std::path::PathBuf;
use tempfile::TempDir;

use super::args::{Cli, Commands};
use super::commands::{TripOutput, execute_cache_key_command, load_travel_info};
use crate::{ItineraError, TravelIntent, emit_jcs};

#[test]
fn test_plan_arguments() {
    let cli = Cli::try_parse_from([
        "itinera", "--verbose", "plan", "--info", "trip.json", "--days", "2",
    ])
    .unwrap();

    assert!(cli.verbose);
    match cli.command {
        Commands::Plan { info, city, days } => {
            assert_eq!(info, Some(PathBuf::from("trip.json")));
            assert_eq!(city, None);
            assert_eq!(days, Some(2));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_plan_without_info_needs_city_and_days() {
    let cli = Cli::try_parse_from(["itinera", "plan", "--city", "Chengdu", "--days", "3"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Plan { info: None, city: Some(_), days: Some(3) }
    ));

    assert!(Cli::try_parse_from(["itinera", "plan", "--city", "Chengdu"]).is_err());
    assert!(Cli::try_parse_from(["itinera", "plan"]).is_err());
}

#[test]
fn test_trip_takes_free_text() {
    let cli = Cli::try_parse_from(["itinera", "trip", "Two days in Xi'an"]).unwrap();
    assert!(matches!(cli.command, Commands::Trip { ref query } if query == "Two days in Xi'an"));
}

#[test]
fn test_trip_output_without_destination() {
    let output = TripOutput {
        intent: TravelIntent::need_more_info("somewhere nice"),
        plan: None,
    };
    let json: serde_json::Value = serde_json::from_str(&emit_jcs(&output).unwrap()).unwrap();
    assert_eq!(json["plan"], serde_json::Value::Null);
    assert_eq!(json["intent"]["need_more_info"], true);
}

#[test]
fn test_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "itinera",
        "ask",
        "Is it rainy in May?",
        "--knowledge",
        "notes.txt",
        "--model",
        "m",
        "--json",
    ])
    .unwrap();

    assert_eq!(cli.model.as_deref(), Some("m"));
    assert!(matches!(
        cli.command,
        Commands::Ask { json: true, knowledge: Some(_), image_description: None, .. }
    ));
}

#[test]
fn test_cache_key_requires_both_parameters() {
    assert!(Cli::try_parse_from(["itinera", "cache-key", "--city", "Chengdu"]).is_err());
    assert!(Cli::try_parse_from(["itinera", "cache-key", "--city", "Chengdu", "--days", "3"]).is_ok());
}

#[test]
fn test_cache_key_rejects_blank_city() {
    let err = execute_cache_key_command("  ", 3).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ItineraError>(),
        Some(ItineraError::InvalidRequest(_))
    ));
}

#[test]
fn test_load_travel_info() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("trip.json");
    std::fs::write(
        &path,
        r#"{"city":"Chengdu","days":3,"attractions":[{"name":"Jinli","describe":"Old street"}]}"#,
    )
    .unwrap();

    let info = load_travel_info(&path).unwrap();
    assert_eq!(info.city, "Chengdu");
    assert_eq!(info.attractions[0].description, "Old street");
}

#[test]
fn test_load_travel_info_errors_are_invalid_requests() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.json");
    assert!(matches!(
        load_travel_info(&missing),
        Err(ItineraError::InvalidRequest(_))
    ));

    let broken = dir.path().join("broken.json");
    std::fs::write(&broken, "{\"city\":").unwrap();
    assert!(matches!(
        load_travel_info(&broken),
        Err(ItineraError::InvalidRequest(_))
    ));
}
