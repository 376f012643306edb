//! Command line interface
//!
//! Subcommands are generated from the spread registry: one per spread type,
//! each with flags for the card selection and the spread's parameters.

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::collections::BTreeMap;
use std::ffi::OsStr;

use tarot::{SpreadRegistry, SpreadTemplate};

use crate::config::{Config, TarotConfig};

const SHOW_PROMPT: &str = "show-prompt";
const SHOW_DIAGNOSTICS: &str = "show-diagnostics";
const PERSIST_READING: &str = "persist-reading";
const CARD_COUNT: &str = "card-count";
const CARD: &str = "card";

/// How the cards of a reading are chosen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardSource {
    /// Draw this many cards from a freshly shuffled deck
    Draw(usize),
    /// Card names given on the command line, resolved through the aliases
    Named(Vec<String>),
}

/// A parsed reading request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingCommand {
    pub spread_type: String,
    pub cards: CardSource,
    pub parameters: BTreeMap<String, String>,
    pub show_prompt: bool,
    pub show_diagnostics: bool,
    pub persist_reading: bool,
}

/// Build the command tree for the configured spreads
pub fn build_command(config: &Config, registry: &SpreadRegistry) -> Command {
    let mut cmd = Command::new("tarobot")
        .display_name(config.app_name.clone())
        .about(format!("{} - tarot card readings from the command line", config.app_name))
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new(SHOW_PROMPT)
                .long(SHOW_PROMPT)
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print the prompt sent to the generation service"),
        )
        .arg(
            Arg::new(SHOW_DIAGNOSTICS)
                .long(SHOW_DIAGNOSTICS)
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Print the full reading with its metadata as JSON"),
        )
        .arg(
            Arg::new(PERSIST_READING)
                .long(PERSIST_READING)
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Record the reading in the history database"),
        );

    for template in registry.iter() {
        cmd = cmd.subcommand(spread_command(template, &config.tarot));
    }

    cmd
}

fn spread_command(template: &SpreadTemplate, tarot: &TarotConfig) -> Command {
    let range = template.card_range(tarot.min_cards, tarot.max_cards);
    let (min, max) = (*range.start(), *range.end());
    let default_count = tarot.default_cards.clamp(min, max);

    let mut cmd = Command::new(template.spread_type.clone())
        .about(template.description.clone())
        .arg(
            Arg::new(CARD_COUNT)
                .long(CARD_COUNT)
                .value_name("N")
                .value_parser(value_parser!(u64).range(min as u64..=max as u64))
                .default_value(default_count.to_string())
                .conflicts_with(CARD)
                .help(format!("Number of tarot cards to draw in the spread [{}-{}]", min, max)),
        )
        .arg(
            Arg::new(CARD)
                .long(CARD)
                .value_name("NAME")
                .num_args(1..)
                .action(ArgAction::Append)
                .help("Tarot cards to use instead of drawing, e.g. --card \"the fool\" \"ace of cups\""),
        );

    for (name, spec) in &template.parameters {
        let mut arg = Arg::new(name.clone())
            .long(name.clone())
            .value_name("TEXT")
            .help(spec.description.clone());

        arg = match &spec.default {
            Some(default) => arg.default_value(default.clone()),
            None => arg.required(true),
        };

        cmd = cmd.arg(arg);
    }

    cmd
}

/// Turn parsed matches into a reading request
pub fn parse_command(matches: &ArgMatches, registry: &SpreadRegistry) -> Result<ReadingCommand> {
    let (spread_type, sub) = matches.subcommand().context("No spread type given")?;
    let template = registry
        .get(spread_type)
        .with_context(|| format!("Unknown spread type: {}", spread_type))?;

    let cards = match sub.get_many::<String>(CARD) {
        Some(names) => CardSource::Named(names.cloned().collect()),
        None => {
            let count = sub
                .get_one::<u64>(CARD_COUNT)
                .context("No card count given")?;
            CardSource::Draw(*count as usize)
        }
    };

    let parameters = template
        .parameters
        .keys()
        .filter_map(|name| sub.get_one::<String>(name).map(|value| (name.clone(), value.clone())))
        .collect();

    Ok(ReadingCommand {
        spread_type: spread_type.to_string(),
        cards,
        parameters,
        show_prompt: flag(matches, sub, SHOW_PROMPT),
        show_diagnostics: flag(matches, sub, SHOW_DIAGNOSTICS),
        persist_reading: flag(matches, sub, PERSIST_READING),
    })
}

/// Whether `--show-diagnostics` is among the raw arguments. Logging starts
/// before the spread subcommands exist, so this runs ahead of clap.
pub fn diagnostics_requested<I, T>(args: I) -> bool
where
    I: IntoIterator<Item = T>,
    T: AsRef<OsStr>,
{
    let flag = format!("--{}", SHOW_DIAGNOSTICS);
    args.into_iter()
        .skip(1)
        .map(|arg| arg.as_ref().to_os_string())
        .take_while(|arg| *arg != "--")
        .any(|arg| arg == flag.as_str())
}

/// Global flags may appear before or after the subcommand
fn flag(matches: &ArgMatches, sub: &ArgMatches, id: &str) -> bool {
    matches.get_flag(id) || sub.get_flag(id)
}
