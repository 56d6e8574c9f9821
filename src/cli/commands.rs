//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use serde::Serialize;
use tracing::info;

use crate::{
    Config, ItineraError, ItineraryPlanner, KeywordRetriever, PlanOutcome, PlannerContext,
    TravelInfo, TravelIntent, TravelRequest, emit_jcs,
};

fn invalid_input(message: String) -> ItineraError {
    ItineraError::InvalidRequest(message)
}

/// Load a `TravelInfo` JSON file.
pub(crate) fn load_travel_info(path: &Path) -> Result<TravelInfo, ItineraError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| invalid_input(format!("cannot read {}: {e}", path.display())))?;
    serde_json::from_str(&raw)
        .map_err(|e| invalid_input(format!("{} is not valid travel info: {e}", path.display())))
}

/// `itinera plan`: print the report (and how it was produced) as canonical JSON.
///
/// With `info_path` the file supplies the destination content; otherwise it
/// is gathered for `city` and `days`.
pub async fn execute_plan_command(
    ctx: &PlannerContext,
    info_path: Option<&Path>,
    city: Option<String>,
    days: Option<u32>,
) -> Result<()> {
    let planner = ItineraryPlanner::new(ctx);
    let outcome = match info_path {
        Some(path) => {
            let info = load_travel_info(path)?;
            let request = TravelRequest::new(
                city.unwrap_or_else(|| info.city.clone()),
                days.unwrap_or(info.days),
            );
            planner.plan(&request, info).await?
        }
        None => {
            let (Some(city), Some(days)) = (city, days) else {
                let message = "--city and --days are required without --info".to_string();
                return Err(invalid_input(message).into());
            };
            planner
                .plan_destination(&TravelRequest::new(city, days), &ctx.gatherer())
                .await?
        }
    };
    ctx.cache().log_stats();

    println!("{}", emit_jcs(&outcome).context("Failed to emit plan JSON")?);
    Ok(())
}

/// `itinera intent`
pub async fn execute_intent_command(ctx: &PlannerContext, query: &str) -> Result<()> {
    let intent = ctx.intent_extractor().extract(query).await;
    println!("{}", emit_jcs(&intent).context("Failed to emit intent JSON")?);
    Ok(())
}

/// Output of `itinera trip`: the extracted intent and, when it named a
/// destination, the plan.
#[derive(Debug, Serialize)]
pub(crate) struct TripOutput {
    pub intent: TravelIntent,
    pub plan: Option<PlanOutcome>,
}

/// `itinera trip`: intent extraction, then gathering and planning.
pub async fn execute_trip_command(ctx: &PlannerContext, query: &str) -> Result<()> {
    let intent = ctx.intent_extractor().extract(query).await;
    let plan = match intent.destination() {
        Some((city, days)) => Some(
            ItineraryPlanner::new(ctx)
                .plan_destination(&TravelRequest::new(city, days), &ctx.gatherer())
                .await?,
        ),
        None => {
            info!("Destination incomplete, nothing to plan");
            None
        }
    };
    ctx.cache().log_stats();

    let output = TripOutput { intent, plan };
    println!("{}", emit_jcs(&output).context("Failed to emit trip JSON")?);
    Ok(())
}

/// `itinera ask`: print the answer, or the whole outcome with `--json`.
pub async fn execute_ask_command(
    ctx: &PlannerContext,
    question: &str,
    image_description: Option<&str>,
    knowledge: Option<&Path>,
    json: bool,
) -> Result<()> {
    let mut answerer = ctx.answerer();
    if let Some(path) = knowledge {
        let path = Utf8PathBuf::from_path_buf(path.to_path_buf()).map_err(|p| {
            invalid_input(format!("knowledge path is not UTF-8: {}", p.display()))
        })?;
        let retriever = KeywordRetriever::load(&path)
            .map_err(|e| invalid_input(format!("cannot load knowledge: {e:#}")))?;
        info!(passages = retriever.len(), path = %path, "Knowledge loaded");
        answerer = answerer.with_retriever(Arc::new(retriever));
    }

    let outcome = answerer
        .answer(question, image_description, knowledge.is_some())
        .await;

    if json {
        println!("{}", emit_jcs(&outcome).context("Failed to emit answer JSON")?);
    } else {
        println!("{}", outcome.answer);
    }
    Ok(())
}

/// `itinera cache-key`
pub fn execute_cache_key_command(city: &str, days: u32) -> Result<()> {
    if city.trim().is_empty() {
        return Err(invalid_input("city must not be empty".to_string()).into());
    }
    let key = ItineraryPlanner::cache_key(&TravelRequest::new(city, days))?;
    println!("{}", key.digest());
    Ok(())
}

/// `itinera config`
pub fn execute_config_command(config: &Config) -> Result<()> {
    for (key, (value, source)) in config.effective_config() {
        println!("{key} = {value}  ({source})");
    }
    Ok(())
}
