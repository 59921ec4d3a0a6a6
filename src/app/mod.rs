use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use tagroute::config::{AudiencesConfig, EngineConfig, load_entities};
use tagroute::dsl::{MatchOptions, ParseError, serialize_tree};
use tagroute::engine::Engine;
use tagroute::routing::RoutingTable;
use tagroute::utils::tag_set;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Engine configuration file (YAML, TOML or JSON)
    #[arg(short, long, global = true, env = "TAGROUTE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Matching flags; each one overrides the configuration file when set.
#[derive(Args, Debug, Clone, Default)]
pub struct MatchArgs {
    /// Compare tags case-insensitively
    #[arg(long)]
    pub ignore_case: bool,

    /// Treat literals ending in ':' as "any tag in this category"
    #[arg(long)]
    pub category_mode: bool,

    /// Treat '*' in literals as a wildcard
    #[arg(long)]
    pub wildcards: bool,
}

impl MatchArgs {
    pub fn apply(&self, mut options: MatchOptions) -> MatchOptions {
        if self.ignore_case {
            options.case_sensitive = false;
        }
        if self.category_mode {
            options.category_mode = true;
        }
        if self.wildcards {
            options.wildcards = true;
        }
        options
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Parse an expression and print its tree as JSON
    Parse {
        #[arg(allow_hyphen_values = true)]
        expression: String,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Evaluate an expression against a set of tags (exit status 1 on no match)
    Eval {
        #[arg(allow_hyphen_values = true)]
        expression: String,

        /// Tag attached to the entity (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        #[command(flatten)]
        matching: MatchArgs,
    },

    /// Show which parts of an expression matched a set of tags
    Explain {
        #[arg(allow_hyphen_values = true)]
        expression: String,

        /// Tag attached to the entity (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,

        #[command(flatten)]
        matching: MatchArgs,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// List the entities in a registry file that match an expression
    Resolve {
        #[arg(allow_hyphen_values = true)]
        expression: String,

        /// Entity registry (JSON or YAML map of entity id to tags)
        #[arg(short, long)]
        entities: PathBuf,

        #[command(flatten)]
        matching: MatchArgs,
    },

    /// Resolve every audience in an audiences file against an entity registry
    Route {
        /// Audiences file (YAML, TOML or JSON)
        #[arg(short, long)]
        audiences: PathBuf,

        /// Entity registry (JSON or YAML map of entity id to tags)
        #[arg(short, long)]
        entities: PathBuf,

        /// Notification severity; audiences with a higher minimum are skipped
        #[arg(short, long)]
        severity: Option<String>,

        #[command(flatten)]
        matching: MatchArgs,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
}

fn invalid_expression(err: ParseError) -> anyhow::Error {
    anyhow!("CLI: Invalid expression\n{}", err.caret_display())
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

fn engine_for(config: &EngineConfig, matching: &MatchArgs) -> Engine {
    let mut config = config.clone();
    config.matching = matching.apply(config.matching);
    Engine::new(&config)
}

pub fn run(cli: &Cli) -> Result<ExitCode> {
    let config = EngineConfig::load(cli.config.as_deref())?;

    match &cli.command {
        Command::Parse { expression, pretty } => {
            let engine = Engine::new(&config);
            let tree = engine.compile(expression).map_err(invalid_expression)?;
            print_json(&serialize_tree(&tree)?, *pretty)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Eval {
            expression,
            tags,
            matching,
        } => {
            let engine = engine_for(&config, matching);
            let matched = engine
                .matches(expression, &tag_set(tags.iter().cloned()))
                .map_err(invalid_expression)?;
            println!("{}", matched);
            Ok(if matched {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            })
        }

        Command::Explain {
            expression,
            tags,
            matching,
            pretty,
        } => {
            let engine = engine_for(&config, matching);
            let annotated = engine
                .explain(expression, &tag_set(tags.iter().cloned()))
                .map_err(invalid_expression)?;
            print_json(&annotated, *pretty)?;
            Ok(ExitCode::SUCCESS)
        }

        Command::Resolve {
            expression,
            entities,
            matching,
        } => {
            let engine = engine_for(&config, matching);
            let registry = load_entities(entities)?;
            let matched = engine
                .resolve(expression, &registry)
                .map_err(invalid_expression)?;
            for id in matched {
                println!("{}", id);
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Route {
            audiences,
            entities,
            severity,
            matching,
            pretty,
        } => {
            let options = matching.apply(config.matching);
            let table = RoutingTable::compile(&AudiencesConfig::load(audiences)?)?;
            let registry = load_entities(entities)?;
            let routes = table.route(&registry, severity.as_deref(), &options);
            print_json(&routes, *pretty)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
