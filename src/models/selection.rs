use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Time of day a dose is taken. Declaration order is the canonical playback
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Night,
}

impl TimeOfDay {
    pub const ALL: [TimeOfDay; 3] = [TimeOfDay::Morning, TimeOfDay::Afternoon, TimeOfDay::Night];

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
            TimeOfDay::Night => "night",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PillType {
    Full,
    Half,
}

impl PillType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PillType::Full => "full",
            PillType::Half => "half",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PillCount {
    One,
    Two,
    Three,
    Four,
}

impl PillCount {
    pub fn as_str(&self) -> &'static str {
        match self {
            PillCount::One => "one",
            PillCount::Two => "two",
            PillCount::Three => "three",
            PillCount::Four => "four",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MealTiming {
    Before,
    During,
    After,
}

impl MealTiming {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealTiming::Before => "before",
            MealTiming::During => "during",
            MealTiming::After => "after",
        }
    }
}

macro_rules! impl_from_str {
    ($ty:ty, $what:literal, [$($variant:expr),+ $(,)?]) => {
        impl FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let wanted = s.trim().to_ascii_lowercase();
                [$($variant),+]
                    .into_iter()
                    .find(|candidate| candidate.as_str() == wanted)
                    .ok_or_else(|| format!("unknown {} '{}'", $what, s))
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_from_str!(TimeOfDay, "time of day", [TimeOfDay::Morning, TimeOfDay::Afternoon, TimeOfDay::Night]);
impl_from_str!(PillType, "pill type", [PillType::Full, PillType::Half]);
impl_from_str!(
    PillCount,
    "pill count",
    [PillCount::One, PillCount::Two, PillCount::Three, PillCount::Four]
);
impl_from_str!(MealTiming, "meal timing", [MealTiming::Before, MealTiming::During, MealTiming::After]);

/// Form fields a [`Selection`] can be missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionField {
    TimeOfDay,
    PillType,
    PillCount,
    MealTiming,
}

impl SelectionField {
    pub fn label(&self) -> &'static str {
        match self {
            SelectionField::TimeOfDay => "time of day",
            SelectionField::PillType => "pill type",
            SelectionField::PillCount => "pill count",
            SelectionField::MealTiming => "meal timing",
        }
    }
}

/// Input of the text-to-sign form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub times: BTreeSet<TimeOfDay>,
    pub pill_type: Option<PillType>,
    pub pill_count: Option<PillCount>,
    pub meal_timing: Option<MealTiming>,
}

/// A selection that passed validation; every field is guaranteed present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidSelection {
    pub times: Vec<TimeOfDay>,
    pub pill_type: PillType,
    pub pill_count: PillCount,
    pub meal_timing: MealTiming,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle_time(&mut self, time: TimeOfDay) {
        if !self.times.remove(&time) {
            self.times.insert(time);
        }
    }

    /// Selects `pill_type`, or clears it when it is already selected.
    pub fn toggle_pill_type(&mut self, pill_type: PillType) {
        toggle_single(&mut self.pill_type, pill_type);
    }

    pub fn toggle_pill_count(&mut self, pill_count: PillCount) {
        toggle_single(&mut self.pill_count, pill_count);
    }

    pub fn toggle_meal_timing(&mut self, meal_timing: MealTiming) {
        toggle_single(&mut self.meal_timing, meal_timing);
    }

    pub fn validate(&self) -> Result<ValidSelection, ValidationError> {
        let mut missing = Vec::new();
        if self.times.is_empty() {
            missing.push(SelectionField::TimeOfDay);
        }
        if self.pill_type.is_none() {
            missing.push(SelectionField::PillType);
        }
        if self.pill_count.is_none() {
            missing.push(SelectionField::PillCount);
        }
        if self.meal_timing.is_none() {
            missing.push(SelectionField::MealTiming);
        }

        match (self.pill_type, self.pill_count, self.meal_timing) {
            (Some(pill_type), Some(pill_count), Some(meal_timing)) if missing.is_empty() => {
                Ok(ValidSelection {
                    // BTreeSet iterates in canonical order.
                    times: self.times.iter().copied().collect(),
                    pill_type,
                    pill_count,
                    meal_timing,
                })
            }
            _ => Err(ValidationError { missing }),
        }
    }
}

fn toggle_single<T: PartialEq>(slot: &mut Option<T>, value: T) {
    if slot.as_ref() == Some(&value) {
        *slot = None;
    } else {
        *slot = Some(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_iterate_in_canonical_order() {
        let mut selection = Selection::new();
        selection.toggle_time(TimeOfDay::Night);
        selection.toggle_time(TimeOfDay::Morning);
        selection.toggle_time(TimeOfDay::Afternoon);
        selection.toggle_time(TimeOfDay::Afternoon);

        let times: Vec<_> = selection.times.iter().copied().collect();
        assert_eq!(times, vec![TimeOfDay::Morning, TimeOfDay::Night]);
    }

    #[test]
    fn reselecting_single_choice_clears_it() {
        let mut selection = Selection::new();
        selection.toggle_pill_type(PillType::Half);
        assert_eq!(selection.pill_type, Some(PillType::Half));
        selection.toggle_pill_type(PillType::Full);
        assert_eq!(selection.pill_type, Some(PillType::Full));
        selection.toggle_pill_type(PillType::Full);
        assert_eq!(selection.pill_type, None);
    }

    #[test]
    fn validation_lists_every_missing_field() {
        let mut selection = Selection::new();
        selection.toggle_pill_type(PillType::Full);

        let err = selection.validate().unwrap_err();
        assert_eq!(
            err.missing,
            vec![
                SelectionField::TimeOfDay,
                SelectionField::PillCount,
                SelectionField::MealTiming
            ]
        );
        assert_eq!(
            err.to_string(),
            "please select time of day, pill count, meal timing"
        );
    }

    #[test]
    fn parses_vocabulary_case_insensitively() {
        assert_eq!("Morning".parse::<TimeOfDay>(), Ok(TimeOfDay::Morning));
        assert_eq!("three".parse::<PillCount>(), Ok(PillCount::Three));
        assert!("twice".parse::<PillCount>().is_err());
    }
}
