//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// itinera - travel itineraries and answers from unreliable LLM backends
#[derive(Parser, Debug)]
#[command(name = "itinera")]
#[command(about = "Plan trips and answer travel questions with retries, fallbacks and caching")]
#[command(long_about = r#"
itinera gathers destination content through web search and model
extraction, turns it into a day-by-day itinerary and answers travel questions
through a generate/evaluate refinement loop. Backend failures are retried
with exponential backoff and end in a deterministic fallback; image lookups
fall through an ordered provider chain to category placeholders. Itinerary
reports are cached by (city, days).

EXAMPLES:
  # Gather content for a destination and plan it
  itinera plan --city Chengdu --days 3

  # From a free-form request: extract the destination, then plan it
  itinera trip "Three days in Chengdu eating hotpot"

  # Plan from a JSON file of attractions, foods and restaurants
  itinera plan --info chengdu.json

  # Same content, different trip length
  itinera plan --info chengdu.json --days 2

  # Extract destination and duration from free text
  itinera intent "Three days in Chengdu eating hotpot"

  # Ask a question, grounding the answer in a local knowledge file
  itinera ask "Is Jinli busy at night?" --knowledge notes.txt

  # Show the cache key a request maps to (no network)
  itinera cache-key --city Chengdu --days 3

CONFIGURATION:
  Precedence: CLI flags > config file > defaults
  The config file is discovered upward from CWD as .itinera/config.toml,
  then $ITINERA_HOME/config.toml. Use --config to name one explicitly.
  API keys are read from the environment variables named in the config.
"#)]
#[command(version)]
pub struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Result cache directory
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Model used for generation
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Model used to score answers (defaults to --model)
    #[arg(long, global = true)]
    pub evaluator_model: Option<String>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate (or fetch from cache) an itinerary report
    ///
    /// Without --info, destination content is gathered first and --city and
    /// --days are required.
    Plan {
        /// JSON file with city, days, attractions, foods and `food_shops`
        #[arg(long)]
        info: Option<PathBuf>,

        /// City to plan (overrides the city named in --info)
        #[arg(long, required_unless_present = "info")]
        city: Option<String>,

        /// Trip length (overrides the day count named in --info)
        #[arg(long, required_unless_present = "info")]
        days: Option<u32>,
    },

    /// Extract the destination from a free-form request and plan it
    Trip {
        /// The traveller's message
        query: String,
    },

    /// Extract destination city and trip length from a free-form request
    Intent {
        /// The traveller's message
        query: String,
    },

    /// Answer a travel question through the refinement loop
    Ask {
        /// The question
        question: String,

        /// Description of an image the question refers to
        #[arg(long)]
        image_description: Option<String>,

        /// Text file of reference passages (blank-line separated)
        #[arg(long)]
        knowledge: Option<PathBuf>,

        /// Print the full outcome (attempts, scores, knowledge) as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the cache key for a (city, days) request
    CacheKey {
        #[arg(long)]
        city: String,

        #[arg(long)]
        days: u32,
    },

    /// Print the effective configuration with the source of each value
    Config,
}
