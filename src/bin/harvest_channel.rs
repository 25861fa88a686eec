#![forbid(unsafe_code)]

//! Command-line front end for the harvest pipeline.
//!
//! Mirrors the dashboard modes: collect a channel into the document store,
//! migrate it into the relational tables, ask one of the fixed questions, and
//! delete from either store. `refresh` re-harvests every stored channel.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tubeharvest::{
    analytics::{self, AnalysisOptions, DEFAULT_PUBLISHED_YEAR, QueryTable, Question},
    config::{RuntimeConfig, RuntimeOverrides, resolve_runtime_config},
    harvest::ChannelHarvester,
    logging, pipeline,
    projection::Cell,
    youtube::YouTubeClient,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Harvest YouTube channel metadata and analyze it")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Directory holding documents.db and relational.db (overrides DATA_ROOT).
    #[arg(long, global = true)]
    data_root: Option<PathBuf>,

    /// Alternate `.env` file.
    #[arg(long, global = true)]
    env_file: Option<PathBuf>,

    /// Print JSON instead of text tables.
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Harvest a channel and upsert it into the document store.
    Harvest {
        /// 24-character channel id starting with `UC`.
        channel_id: String,
    },
    /// Project a stored channel and append it to the relational tables.
    Migrate {
        channel_id: String,
        /// Leave the first video of the channel out of the relational rows.
        #[arg(long)]
        skip_first_video: bool,
    },
    /// List channels in the document store.
    List,
    /// List the analytical questions.
    Questions,
    /// Run one analytical question (1-10).
    Ask {
        index: usize,
        /// Publication year for question 8.
        #[arg(long, default_value_t = DEFAULT_PUBLISHED_YEAR)]
        year: i32,
    },
    /// Delete a channel from the document store.
    DeleteDocument { channel_id: String },
    /// Delete a channel's rows from the relational tables.
    DeleteRelational { channel_id: String },
    /// Re-harvest every channel already in the document store.
    Refresh,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;
    let cli = Cli::parse();

    let skip_first_video = match &cli.command {
        Command::Migrate {
            skip_first_video: true,
            ..
        } => Some(true),
        _ => None,
    };
    let config = resolve_runtime_config(RuntimeOverrides {
        data_root: cli.global.data_root.clone(),
        env_path: cli.global.env_file.clone(),
        skip_first_video,
        ..RuntimeOverrides::default()
    })?;

    run(cli.command, &config, cli.global.json).await
}

async fn run(command: Command, config: &RuntimeConfig, json: bool) -> Result<()> {
    let paths = config.data_paths();
    match command {
        Command::Harvest { channel_id } => {
            let summary = pipeline::harvest_and_store(harvester(config)?, &paths, &channel_id)
                .await
                .with_context(|| format!("harvesting {channel_id}"))?;
            emit(json, &summary, || {
                format!(
                    "{} ({}): {} videos, {} sampled comments, {:?}",
                    summary.channel_name,
                    summary.channel_id,
                    summary.videos,
                    summary.comments,
                    summary.outcome
                )
            })
        }
        Command::Migrate { channel_id, .. } => {
            let report = pipeline::migrate(&paths, &channel_id, config.projection_options())
                .await
                .with_context(|| format!("migrating {channel_id}"))?;
            emit(json, &report, || {
                format!(
                    "{}: appended {} channel, {} playlist, {} video and {} comment rows",
                    report.channel_name,
                    report.rows.channel,
                    report.rows.playlist,
                    report.rows.video,
                    report.rows.comments
                )
            })
        }
        Command::List => {
            let documents = paths.documents().await?.list().await?;
            emit(json, &documents, || {
                documents
                    .iter()
                    .map(|doc| format!("{}\t{}\t{}", doc.channel_id, doc.channel_name, doc.harvested_at))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
        }
        Command::Questions => {
            for question in Question::ALL {
                println!("{:>2}. {}", question.index(), question.title());
            }
            Ok(())
        }
        Command::Ask { index, year } => {
            let Some(question) = Question::from_index(index) else {
                bail!("question index must be between 1 and {}", Question::ALL.len());
            };
            let store = paths.relational().await?;
            let table =
                analytics::run_question(&store, question, &AnalysisOptions { year }).await?;
            emit(json, &table, || render_table(&table))
        }
        Command::DeleteDocument { channel_id } => {
            let deleted = pipeline::delete_aggregate(&paths, &channel_id).await?;
            if deleted == 0 {
                println!("no document stored for {channel_id}");
            } else {
                println!("deleted document for {channel_id}");
            }
            Ok(())
        }
        Command::DeleteRelational { channel_id } => {
            let report = pipeline::delete_relational_by_channel(&paths, &channel_id).await?;
            emit(json, &report, || {
                format!(
                    "removed {} comment, {} video, {} playlist and {} channel rows",
                    report.comments, report.video, report.playlist, report.channel
                )
            })
        }
        Command::Refresh => {
            let results = pipeline::refresh_all(harvester(config)?, &paths).await?;
            let mut failed = 0;
            for (channel_id, result) in &results {
                match result {
                    Ok(summary) => println!("{channel_id}: {} videos", summary.videos),
                    Err(err) => {
                        failed += 1;
                        eprintln!("{channel_id}: {err}");
                    }
                }
            }
            if failed > 0 {
                bail!("{failed} of {} channels failed to refresh", results.len());
            }
            Ok(())
        }
    }
}

fn harvester(config: &RuntimeConfig) -> Result<Arc<ChannelHarvester<YouTubeClient>>> {
    let client = YouTubeClient::new(config.require_api_key()?, &config.youtube_api_base);
    Ok(Arc::new(ChannelHarvester::new(client)))
}

fn emit<T: Serialize>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("serializing output")?
        );
    } else {
        println!("{}", text());
    }
    Ok(())
}

fn render_table(table: &QueryTable) -> String {
    let mut out = format!("{}. {}\n", table.question, table.title);
    out.push_str(&table.columns.join("\t"));
    for row in &table.rows {
        out.push('\n');
        let cells: Vec<String> = row.iter().map(render_cell).collect();
        out.push_str(&cells.join("\t"));
    }
    out
}

fn render_cell(cell: &Cell) -> String {
    match cell {
        Cell::Null => String::new(),
        Cell::Integer(value) => value.to_string(),
        Cell::Text(value) => value.clone(),
    }
}
