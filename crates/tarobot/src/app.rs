//! Reading orchestration
//!
//! Picks the cards, builds the spread prompt, asks the generation backend for
//! an interpretation, and optionally records the result.

use anyhow::{Context, Result};
use colored::Colorize;
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use tarot::spread::render;
use tarot::{card, Card, CardReading, CardResolver, Deck, Metadata, Spread, SpreadBuilder, TarotError};

use crate::backend::Generator;
use crate::cli::{CardSource, ReadingCommand};
use crate::config::{CompletionConfig, Config};
use crate::store::ReadingStore;

/// Token the summary template uses for the first response
pub const RESPONSE_TOKEN: &str = "response";

pub struct App {
    config: Config,
    resolver: CardResolver,
    builder: SpreadBuilder,
    generator: Box<dyn Generator>,
}

impl App {
    pub fn new(config: Config, resolver: CardResolver, builder: SpreadBuilder, generator: Box<dyn Generator>) -> Self {
        Self {
            config,
            resolver,
            builder,
            generator,
        }
    }

    /// Run one reading end to end and print it
    pub fn run(&self, command: &ReadingCommand) -> Result<CardReading> {
        let cards = self.select_cards(command)?;
        let spread = self
            .builder
            .build(&command.spread_type, &cards, &command.parameters)?;

        println!("{}", "Cards".bold());
        for card in &spread.cards {
            println!("  {}", card::display_name(*card).cyan());
        }
        println!();

        if command.show_prompt {
            println!("{}", "Prompt".bold());
            println!("{}", spread.prompt.dimmed());
            println!();
        }

        let reading = self.interpret(&spread)?;

        println!("{}", reading.response);
        if let Some(summary) = &reading.summary {
            println!();
            println!("{} {}", "Summary:".bold(), summary.yellow());
        }

        if command.show_diagnostics {
            println!();
            println!("{}", serde_json::to_string_pretty(&reading)?);
        }

        if command.persist_reading {
            self.persist(&reading);
        }

        Ok(reading)
    }

    /// Draw or resolve the cards for a reading, bounded by the spread's card range
    pub fn select_cards(&self, command: &ReadingCommand) -> Result<Vec<Card>> {
        let template = self
            .builder
            .registry()
            .get(&command.spread_type)
            .ok_or_else(|| TarotError::UnknownSpreadType(command.spread_type.clone()))?;

        let tarot = &self.config.tarot;
        let range = template.card_range(tarot.min_cards, tarot.max_cards);

        let cards = match &command.cards {
            CardSource::Draw(count) => {
                check_card_count(&range, *count)?;
                Deck::new().draw(*count)?
            }
            CardSource::Named(names) => {
                check_card_count(&range, names.len())?;
                self.resolver.resolve_card_list(names)?
            }
        };

        debug!(spread_type = %command.spread_type, count = cards.len(), "cards selected");
        Ok(cards)
    }

    /// Ask the backend for a reading of the spread, plus the summary when enabled
    pub fn interpret(&self, spread: &Spread) -> Result<CardReading> {
        info!(
            spread_type = %spread.spread_type,
            cards = %spread.card_list(),
            "generating tarot card reading"
        );

        let (response, metadata) = self
            .generate(&spread.prompt, &self.config.generation.reading)
            .context("Failed to generate the reading")?;

        let mut reading = CardReading::new(spread, response, metadata);

        if self.config.generation.summary.enabled {
            if let Err(e) = self.summarize(&mut reading) {
                warn!("Failed to summarize the reading: {:#}", e);
            }
        }

        Ok(reading)
    }

    /// Chained call over the first response; its usage is folded into the reading
    pub fn summarize(&self, reading: &mut CardReading) -> Result<()> {
        let summary = &self.config.generation.summary;

        let mut tokens = BTreeMap::new();
        tokens.insert(RESPONSE_TOKEN.to_string(), reading.response.clone());
        let prompt = render(&summary.template, &tokens)?;

        let (text, metadata) = self.generate(&prompt, &summary.request)?;
        reading.attach_summary(text, &metadata);
        Ok(())
    }

    fn generate(&self, prompt: &str, request: &CompletionConfig) -> Result<(String, Metadata)> {
        let started = Instant::now();
        let generation = self.generator.generate(prompt, request)?;
        let response_ms = started.elapsed().as_millis() as u64;

        debug!(
            id = %generation.id,
            model = %generation.model,
            total_tokens = generation.usage.total_tokens,
            response_ms,
            "generation complete"
        );

        let metadata = Metadata {
            generation_id: generation.id,
            model: generation.model,
            created_at: generation.created_at,
            response_ms,
            usage: generation.usage,
            max_tokens: Some(request.max_tokens),
            temperature: request.temperature,
            top_p: request.top_p,
        };

        Ok((generation.text, metadata))
    }

    /// Record the reading; failures are logged and never abort the run
    pub fn persist(&self, reading: &CardReading) {
        let db = &self.config.db;
        let timeout = Duration::from_secs(db.busy_timeout_secs);

        match ReadingStore::open(&db.path(), timeout).and_then(|store| store.record(reading)) {
            Ok(id) => info!(id, "card reading recorded"),
            Err(e) => error!("Failed to record card reading in the database: {:#}", e),
        }
    }
}

fn check_card_count(range: &RangeInclusive<usize>, count: usize) -> tarot::Result<()> {
    if range.contains(&count) {
        Ok(())
    } else {
        Err(TarotError::CardCountOutOfRange {
            min: *range.start(),
            max: *range.end(),
            actual: count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, Generation};
    use chrono::Utc;
    use std::cell::RefCell;
    use std::path::PathBuf;
    use tarot::{MajorArcana, Rank, Suit, SpreadRegistry, Usage};

    /// Answers every prompt with a canned reply and remembers what it was asked
    struct StubGenerator {
        reply: String,
        prompts: RefCell<Vec<String>>,
    }

    impl Generator for StubGenerator {
        fn generate(&self, prompt: &str, request: &CompletionConfig) -> Result<Generation, BackendError> {
            let mut prompts = self.prompts.borrow_mut();
            prompts.push(prompt.to_string());
            Ok(Generation {
                id: format!("stub-{}", prompts.len()),
                model: request.model.clone(),
                created_at: Utc::now(),
                usage: Usage {
                    prompt_tokens: 10,
                    completion_tokens: 20,
                    total_tokens: 30,
                },
                text: self.reply.clone(),
            })
        }
    }

    struct FailingGenerator;

    impl Generator for FailingGenerator {
        fn generate(&self, _prompt: &str, _request: &CompletionConfig) -> Result<Generation, BackendError> {
            Err(BackendError::EmptyResponse)
        }
    }

    fn app_with(config: Config, generator: Box<dyn Generator>) -> App {
        App::new(
            config,
            CardResolver::builtin().unwrap(),
            SpreadBuilder::new(SpreadRegistry::builtin().unwrap()),
            generator,
        )
    }

    fn stub_app(config: Config) -> App {
        app_with(
            config,
            Box::new(StubGenerator {
                reply: "Good things are coming.".to_string(),
                prompts: RefCell::new(Vec::new()),
            }),
        )
    }

    fn command(spread_type: &str, cards: CardSource) -> ReadingCommand {
        ReadingCommand {
            spread_type: spread_type.to_string(),
            cards,
            parameters: BTreeMap::new(),
            show_prompt: false,
            show_diagnostics: false,
            persist_reading: false,
        }
    }

    fn named(names: &[&str]) -> CardSource {
        CardSource::Named(names.iter().map(|n| n.to_string()).collect())
    }

    #[test]
    fn test_select_drawn_cards() {
        let app = stub_app(Config::default());
        let cards = app.select_cards(&command("card-list", CardSource::Draw(4))).unwrap();
        assert_eq!(cards.len(), 4);

        let mut unique = cards.clone();
        unique.sort_by_key(|c| card::ordinal(*c));
        unique.dedup();
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_select_named_cards() {
        let app = stub_app(Config::default());
        let cards = app
            .select_cards(&command("card-list", named(&["the pope", "deuce of coins"])))
            .unwrap();
        assert_eq!(
            cards,
            vec![
                Card::Major(MajorArcana::TheHierophant),
                Card::Minor(Rank::Two, Suit::Pentacles),
            ]
        );
    }

    #[test]
    fn test_select_card_errors() {
        let app = stub_app(Config::default());

        let err = app
            .select_cards(&command("card-list", named(&["the fool", "the jokester"])))
            .unwrap_err();
        assert_eq!(err.to_string(), "Unknown card: the jokester");

        let err = app
            .select_cards(&command("card-list", named(&["the fool", "the jester"])))
            .unwrap_err();
        assert_eq!(err.to_string(), "Duplicate card: The Fool");

        let err = app
            .select_cards(&command("card-list", named(&["king of coins", "King of Pentacles"])))
            .unwrap_err();
        assert_eq!(err.to_string(), "Duplicate card: King of Pentacles");

        let err = app.select_cards(&command("card-list", CardSource::Draw(6))).unwrap_err();
        assert_eq!(err.to_string(), "Only [1-5] cards allowed in the tarot card spread");

        let err = app
            .select_cards(&command("past-present-future", named(&["the fool"])))
            .unwrap_err();
        assert_eq!(err.to_string(), "Only [3-3] cards allowed in the tarot card spread");

        let err = app.select_cards(&command("celtic-cross", CardSource::Draw(3))).unwrap_err();
        assert!(matches!(err.downcast_ref::<TarotError>(), Some(TarotError::UnknownSpreadType(_))));
    }

    #[test]
    fn test_run_one_card() {
        let app = stub_app(Config::default());
        let reading = app.run(&command("one-card", named(&["the magician"]))).unwrap();

        assert_eq!(reading.spread_type, "one-card");
        assert_eq!(reading.cards, vec![Card::Major(MajorArcana::TheMagician)]);
        assert_eq!(reading.prompt, "Tarot card reading for The Magician.");
        assert_eq!(reading.response, "Good things are coming.");
        assert_eq!(reading.summary, None);
        assert!(reading.parameters.is_empty());
        assert_eq!(reading.metadata.generation_id, "stub-1");
        assert_eq!(reading.metadata.max_tokens, Some(2048));
        assert_eq!(reading.metadata.usage.total_tokens, 30);
    }

    #[test]
    fn test_run_keeps_caller_parameters() {
        let app = stub_app(Config::default());
        let mut cmd = command("card-list", named(&["the fool", "the sun"]));
        cmd.parameters.insert("seeker".to_string(), "Alice".to_string());
        cmd.parameters.insert("teller".to_string(), "Dr Seuss".to_string());

        let reading = app.run(&cmd).unwrap();
        assert_eq!(
            reading.prompt,
            "Tarot card reading for Alice with the cards The Fool, The Sun in the style of Dr Seuss."
        );
        assert_eq!(reading.parameter("seeker"), Some("Alice"));
        assert_eq!(reading.parameter("card_list"), None);
        assert_eq!(reading.parameters.len(), 2);
    }

    #[test]
    fn test_missing_parameters_fail_before_generation() {
        let app = stub_app(Config::default());
        let err = app
            .run(&command("situation-obstacle-advice", named(&["the fool", "the sun", "the moon"])))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<TarotError>(),
            Some(TarotError::MissingParameters { .. })
        ));
    }

    #[test]
    fn test_summary_is_chained() {
        let mut config = Config::default();
        config.generation.summary.enabled = true;
        config.generation.summary.template = "Summarize: [response]".to_string();

        let generator = Box::new(StubGenerator {
            reply: "Positive".to_string(),
            prompts: RefCell::new(Vec::new()),
        });
        let app = app_with(config, generator);

        let reading = app.run(&command("one-card", named(&["the star"]))).unwrap();
        assert_eq!(reading.summary.as_deref(), Some("Positive"));
        assert_eq!(reading.metadata.generation_id, "stub-1");
        assert_eq!(reading.metadata.usage.total_tokens, 60);
    }

    #[test]
    fn test_summary_prompt_contains_response() {
        let mut config = Config::default();
        config.generation.summary.enabled = true;
        config.generation.summary.template = "Summarize: [response]".to_string();

        let app = stub_app(config);
        let spread = app
            .builder
            .build("one-card", &[Card::Major(MajorArcana::TheStar)], &BTreeMap::new())
            .unwrap();
        let mut reading = app.interpret(&spread).unwrap();
        reading.summary = None;
        app.summarize(&mut reading).unwrap();
        assert_eq!(reading.summary.as_deref(), Some("Good things are coming."));
    }

    #[test]
    fn test_generation_failure_propagates() {
        let app = app_with(Config::default(), Box::new(FailingGenerator));
        let err = app.run(&command("one-card", CardSource::Draw(1))).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to generate the reading"));
    }

    #[test]
    fn test_persist_records_reading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.db");

        let mut config = Config::default();
        config.db.path = Some(path.clone());

        let app = stub_app(config);
        let mut cmd = command("past-present-future", CardSource::Draw(3));
        cmd.persist_reading = true;
        app.run(&cmd).unwrap();

        assert!(path.exists());
    }

    #[test]
    fn test_persist_failure_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, "").unwrap();

        let mut config = Config::default();
        config.db.path = Some(PathBuf::from(&blocker).join("readings.db"));

        let app = stub_app(config);
        let mut cmd = command("one-card", CardSource::Draw(1));
        cmd.persist_reading = true;

        let reading = app.run(&cmd).unwrap();
        assert_eq!(reading.response, "Good things are coming.");
    }
}
