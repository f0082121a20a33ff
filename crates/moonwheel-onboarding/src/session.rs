//! Pure onboarding state machine.
//!
//! ```text
//! AwaitingRegion ──region──▶ AwaitingTag ──tag──▶ AwaitingDailyChoice ──yes/no──▶ Complete
//!        │                        │                         │
//!        └────────cancel──────────┴───────────cancel────────┴──────────▶ Cancelled
//! ```
//!
//! Choices travel through chat components as custom ids of the form
//! `onboard:<step>:<value>`, so a button click maps straight to a [`Choice`].

use std::fmt;

use moonwheel_core::RegionCatalog;
use moonwheel_prefs::PreferenceUpdate;

use crate::error::{OnboardingError, Result};

/// Custom-id prefix shared by every onboarding component.
pub const CUSTOM_ID_PREFIX: &str = "onboard:";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    AwaitingRegion,
    AwaitingTag,
    AwaitingDailyChoice,
    Complete,
    Cancelled,
}

impl Step {
    pub fn is_terminal(self) -> bool {
        matches!(self, Step::Complete | Step::Cancelled)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::AwaitingRegion => "awaiting_region",
            Step::AwaitingTag => "awaiting_tag",
            Step::AwaitingDailyChoice => "awaiting_daily_choice",
            Step::Complete => "complete",
            Step::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// One user answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Choice {
    Region(String),
    Tag(String),
    Daily(bool),
    Cancel,
}

impl Choice {
    /// Decode a component custom id. Returns `None` for ids that are not
    /// onboarding choices.
    pub fn parse(custom_id: &str) -> Option<Choice> {
        let rest = custom_id.strip_prefix(CUSTOM_ID_PREFIX)?;
        if rest == "cancel" {
            return Some(Choice::Cancel);
        }
        let (step, value) = rest.split_once(':')?;
        if value.is_empty() {
            return None;
        }
        match step {
            "region" => Some(Choice::Region(value.to_string())),
            "tag" => Some(Choice::Tag(value.to_string())),
            "daily" => match value {
                "yes" => Some(Choice::Daily(true)),
                "no" => Some(Choice::Daily(false)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn custom_id(&self) -> String {
        match self {
            Choice::Region(key) => format!("{CUSTOM_ID_PREFIX}region:{key}"),
            Choice::Tag(tag) => format!("{CUSTOM_ID_PREFIX}tag:{tag}"),
            Choice::Daily(true) => format!("{CUSTOM_ID_PREFIX}daily:yes"),
            Choice::Daily(false) => format!("{CUSTOM_ID_PREFIX}daily:no"),
            Choice::Cancel => format!("{CUSTOM_ID_PREFIX}cancel"),
        }
    }
}

/// Result of a successful [`OnboardingSession::apply`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Moved to the next non-terminal step.
    Advanced(Step),
    /// All three answers collected; the session holds the final update.
    Completed,
    Cancelled,
}

/// A clickable option as the chat layer should render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptOption {
    pub custom_id: String,
    pub label: String,
    pub emoji: Option<String>,
}

/// What to show the user for the session's current step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingPrompt {
    pub step: Step,
    pub text: String,
    pub options: Vec<PromptOption>,
}

/// Answers collected so far. Nothing here touches storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnboardingSession {
    step: Step,
    region: Option<String>,
    tag: Option<String>,
    daily_digest: Option<bool>,
}

impl Default for OnboardingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl OnboardingSession {
    pub fn new() -> Self {
        Self {
            step: Step::AwaitingRegion,
            region: None,
            tag: None,
            daily_digest: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    /// Apply one answer. On error the session is unchanged.
    ///
    /// `tags` is the offered tag set; region keys are checked against
    /// `catalog`.
    pub fn apply(
        &mut self,
        choice: &Choice,
        catalog: &RegionCatalog,
        tags: &[String],
    ) -> Result<Transition> {
        if self.step.is_terminal() {
            return Err(OnboardingError::Finished { step: self.step });
        }

        match (self.step, choice) {
            (_, Choice::Cancel) => {
                self.step = Step::Cancelled;
                Ok(Transition::Cancelled)
            }
            (Step::AwaitingRegion, Choice::Region(key)) => {
                if catalog.get(key).is_none() {
                    return Err(OnboardingError::UnknownOption { value: key.clone() });
                }
                self.region = Some(key.clone());
                self.step = Step::AwaitingTag;
                Ok(Transition::Advanced(self.step))
            }
            (Step::AwaitingTag, Choice::Tag(tag)) => {
                let offered = tags.iter().find(|t| t.eq_ignore_ascii_case(tag));
                let Some(offered) = offered else {
                    return Err(OnboardingError::UnknownOption { value: tag.clone() });
                };
                self.tag = Some(offered.clone());
                self.step = Step::AwaitingDailyChoice;
                Ok(Transition::Advanced(self.step))
            }
            (Step::AwaitingDailyChoice, Choice::Daily(yes)) => {
                self.daily_digest = Some(*yes);
                self.step = Step::Complete;
                Ok(Transition::Completed)
            }
            (step, _) => Err(OnboardingError::WrongStep { step }),
        }
    }

    /// The single write made on completion. `None` until the session is
    /// complete.
    pub fn to_update(&self) -> Option<PreferenceUpdate> {
        if self.step != Step::Complete {
            return None;
        }
        let (Some(region), Some(tag), Some(daily)) =
            (&self.region, &self.tag, self.daily_digest)
        else {
            return None;
        };
        Some(
            PreferenceUpdate::new()
                .region(region.clone())
                .tag(tag.clone())
                .daily_digest(daily)
                .subscribed(true),
        )
    }

    /// Prompt for the current step.
    pub fn prompt(&self, catalog: &RegionCatalog, tags: &[String]) -> OnboardingPrompt {
        let cancel = PromptOption {
            custom_id: Choice::Cancel.custom_id(),
            label: "Cancel".into(),
            emoji: None,
        };
        let (text, mut options) = match self.step {
            Step::AwaitingRegion => (
                "Step 1 of 3: which region's sky do you live under?".to_string(),
                catalog
                    .iter()
                    .map(|r| PromptOption {
                        custom_id: Choice::Region(r.key.clone()).custom_id(),
                        label: r.name.clone(),
                        emoji: Some(r.emoji.clone()),
                    })
                    .collect::<Vec<_>>(),
            ),
            Step::AwaitingTag => (
                "Step 2 of 3: pick the sign that fits you best.".to_string(),
                tags.iter()
                    .map(|t| PromptOption {
                        custom_id: Choice::Tag(t.clone()).custom_id(),
                        label: t.clone(),
                        emoji: None,
                    })
                    .collect(),
            ),
            Step::AwaitingDailyChoice => (
                "Step 3 of 3: would you like a daily message? (`/schedule` changes the time)".to_string(),
                vec![
                    PromptOption {
                        custom_id: Choice::Daily(true).custom_id(),
                        label: "Yes please".into(),
                        emoji: Some("\u{2600}\u{fe0f}".into()),
                    },
                    PromptOption {
                        custom_id: Choice::Daily(false).custom_id(),
                        label: "Event alerts only".into(),
                        emoji: Some("\u{1f319}".into()),
                    },
                ],
            ),
            Step::Complete => ("You're all set. Blessed be!".to_string(), Vec::new()),
            Step::Cancelled => (
                "Onboarding cancelled. Nothing was saved.".to_string(),
                Vec::new(),
            ),
        };
        if !self.step.is_terminal() {
            options.push(cancel);
        }
        OnboardingPrompt {
            step: self.step,
            text,
            options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moonwheel_core::config::default_tags;

    fn run(session: &mut OnboardingSession, choice: Choice) -> Result<Transition> {
        session.apply(&choice, &RegionCatalog::builtin(), &default_tags())
    }

    #[test]
    fn happy_path_builds_one_update() {
        let mut s = OnboardingSession::new();
        assert_eq!(
            run(&mut s, Choice::Region("europe".into())).unwrap(),
            Transition::Advanced(Step::AwaitingTag)
        );
        assert!(s.to_update().is_none());
        run(&mut s, Choice::Tag("leo".into())).unwrap();
        assert_eq!(run(&mut s, Choice::Daily(true)).unwrap(), Transition::Completed);

        let update = s.to_update().unwrap();
        assert_eq!(update.region.as_deref(), Some("europe"));
        assert_eq!(update.tag.as_deref(), Some("Leo"));
        assert_eq!(update.daily_digest, Some(true));
        assert_eq!(update.subscribed, Some(true));
        assert_eq!(update.delivery_hour, None);
    }

    #[test]
    fn out_of_order_choice_is_rejected_without_change() {
        let mut s = OnboardingSession::new();
        let err = run(&mut s, Choice::Daily(true)).unwrap_err();
        assert!(matches!(err, OnboardingError::WrongStep { step: Step::AwaitingRegion }));
        assert_eq!(s, OnboardingSession::new());
    }

    #[test]
    fn unknown_options_are_rejected() {
        let mut s = OnboardingSession::new();
        assert!(run(&mut s, Choice::Region("atlantis".into())).is_err());
        run(&mut s, Choice::Region("africa".into())).unwrap();
        assert!(run(&mut s, Choice::Tag("Ophiuchus".into())).is_err());
        assert_eq!(s.step(), Step::AwaitingTag);
    }

    #[test]
    fn cancel_from_any_open_step() {
        for answers in [0, 1, 2] {
            let mut s = OnboardingSession::new();
            if answers >= 1 {
                run(&mut s, Choice::Region("oceania-asia".into())).unwrap();
            }
            if answers >= 2 {
                run(&mut s, Choice::Tag("Pisces".into())).unwrap();
            }
            assert_eq!(run(&mut s, Choice::Cancel).unwrap(), Transition::Cancelled);
            assert!(s.to_update().is_none());
            assert!(run(&mut s, Choice::Cancel).is_err());
        }
    }

    #[test]
    fn custom_ids_decode() {
        for choice in [
            Choice::Region("north-america".into()),
            Choice::Tag("Scorpio".into()),
            Choice::Daily(false),
            Choice::Cancel,
        ] {
            assert_eq!(Choice::parse(&choice.custom_id()), Some(choice));
        }
        assert_eq!(Choice::parse("onboard:daily:maybe"), None);
        assert_eq!(Choice::parse("onboard:region:"), None);
        assert_eq!(Choice::parse("mw:inspire"), None);
    }

    #[test]
    fn prompts_list_offered_options_plus_cancel() {
        let catalog = RegionCatalog::builtin();
        let tags = default_tags();
        let prompt = OnboardingSession::new().prompt(&catalog, &tags);
        assert_eq!(prompt.options.len(), catalog.len() + 1);
        assert_eq!(prompt.options.last().unwrap().custom_id, "onboard:cancel");
    }
}
