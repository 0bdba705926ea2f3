//! Questionnaire catalog
//!
//! A validated, immutable set of [`QuestionBankItem`]s. The standard bank
//! covers the four functional categories with weighted items whose options are
//! ordered from best to worst status.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::types::{QuestionBankItem, QuestionCategory};

/// Validated question catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<QuestionBankItem>", into = "Vec<QuestionBankItem>")]
pub struct QuestionBank {
    items: Vec<QuestionBankItem>,
}

impl QuestionBank {
    /// Build a bank, rejecting malformed items and duplicate ids
    pub fn new(items: Vec<QuestionBankItem>) -> Result<Self, EngineError> {
        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            item.validate()?;
            if !seen.insert(item.id) {
                return Err(EngineError::DuplicateQuestionId(item.id));
            }
        }
        Ok(Self { items })
    }

    /// Parse a bank from a JSON array of items
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        let items: Vec<QuestionBankItem> = serde_json::from_str(json)?;
        Self::new(items)
    }

    pub fn items(&self) -> &[QuestionBankItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: u32) -> Option<&QuestionBankItem> {
        self.items.iter().find(|q| q.id == id)
    }

    /// Number of items per category
    pub fn count_in(&self, category: QuestionCategory) -> usize {
        self.items.iter().filter(|q| q.category == category).count()
    }

    /// The built-in 25 item catalog
    pub fn standard() -> Self {
        Self {
            items: standard_items(),
        }
    }
}

impl TryFrom<Vec<QuestionBankItem>> for QuestionBank {
    type Error = EngineError;

    fn try_from(items: Vec<QuestionBankItem>) -> Result<Self, Self::Error> {
        Self::new(items)
    }
}

impl From<QuestionBank> for Vec<QuestionBankItem> {
    fn from(bank: QuestionBank) -> Self {
        bank.items
    }
}

fn item(id: u32, category: QuestionCategory, text: &str, options: [&str; 4], weight: f64) -> QuestionBankItem {
    QuestionBankItem {
        id,
        category,
        text: text.to_string(),
        options: options.iter().map(|o| o.to_string()).collect(),
        correct_index: 0,
        weight,
    }
}

fn standard_items() -> Vec<QuestionBankItem> {
    use QuestionCategory::{Executive, Memory, Mood, Safety};

    vec![
        item(101, Memory, "Frequency of repetitive questions/stories?", ["Rarely/Never", "Sometimes", "Frequently", "Constantly"], 1.2),
        item(102, Memory, "Disorientation in familiar places?", ["Never", "Rarely", "Sometimes", "Often"], 1.5),
        item(103, Memory, "Forgetting names of close family members?", ["Never", "Occasionally", "Frequently", "Always"], 1.8),
        item(104, Memory, "Misplacing items in unusual places (e.g. keys in fridge)?", ["Never", "Rarely", "Sometimes", "Often"], 1.4),
        item(105, Memory, "Difficulty recalling recent events (e.g. breakfast)?", ["No difficulty", "Mild", "Moderate", "Severe"], 1.5),
        item(106, Memory, "Forgetting appointments or medications?", ["Never", "Rarely", "Sometimes", "Frequently"], 1.6),
        item(201, Executive, "Calculation: Bill is $15.50, you pay $20. Change?", ["$4.50", "$3.50", "$5.50", "$2.50"], 1.0),
        item(202, Executive, "Ability to perform routine tasks (e.g. coffee)?", ["Fully Capable", "Hesitant", "Need Help", "Unable"], 1.2),
        item(203, Executive, "Word finding difficulty?", ["None", "Occasional", "Frequent", "Significant"], 1.3),
        item(204, Executive, "Difficulty planning complex tasks (e.g. paying bills)?", ["None", "Mild", "Moderate", "Severe"], 1.4),
        item(205, Executive, "Judgment in social situations?", ["Normal", "Questionable", "Poor", "Inappropriate"], 1.2),
        item(206, Executive, "Problem Solving: If the sink is overflowing, what do you do?", ["Turn off water", "Call plumber", "Wait", "Panic"], 1.1),
        item(207, Executive, "Sequence: What comes next? 2, 4, 6, 8...", ["10", "12", "9", "11"], 1.0),
        item(301, Safety, "Safety incidents (stove on, unlocked doors)?", ["Never", "Rarely", "Occasionally", "Frequently"], 1.5),
        item(302, Safety, "Reaction to smell of smoke?", ["Evacuate/Call emergency services", "Investigate", "Panic/Freeze", "Ignore"], 1.4),
        item(303, Safety, "Wandering or getting lost outside?", ["Never", "Once", "Occasionally", "Frequently"], 1.8),
        item(304, Safety, "Driving capability/accidents?", ["Safe/No Driving", "Minor Concerns", "Near misses", "Unsafe/Accidents"], 1.6),
        item(305, Safety, "Handling of sharp objects/tools?", ["Safe", "Cautious", "Clumsy", "Dangerous"], 1.3),
        item(306, Safety, "Compliance with critical medication?", ["Always", "Mostly", "Often forgets", "Refuses/Unable"], 1.7),
        item(401, Mood, "Recent mood changes (irritability, anxiety)?", ["None", "Mild", "Moderate", "Severe"], 0.8),
        item(402, Mood, "Sleep quality pattern?", ["Normal", "Occasional waking", "Frequent confusion", "Reversed cycle"], 1.0),
        item(403, Mood, "Withdrawal from social activities?", ["Active", "Slight", "Significant", "Isolation"], 1.1),
        item(404, Mood, "Appetite or weight changes?", ["Stable", "Mild change", "Moderate", "Significant"], 0.9),
        item(405, Mood, "Signs of suspicion or paranoia?", ["None", "Rare", "Frequent", "Delusional"], 1.3),
        item(406, Mood, "Level of energy/motivation?", ["Normal", "Low", "Lethargic", "None"], 0.9),
    ]
}
