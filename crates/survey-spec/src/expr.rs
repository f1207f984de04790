use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::answers::AnswerMap;
use crate::error::UnsupportedOperatorError;

/// Visibility rule attached to a section or an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Logic {
    /// A logic block without a condition is treated as always true.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Logic {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition: Some(condition),
        }
    }

    pub fn evaluate(&self, answers: &AnswerMap) -> bool {
        self.condition
            .as_ref()
            .is_none_or(|condition| evaluate(condition, answers))
    }
}

/// Boolean expression over answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Condition {
    Combinator(Combinator),
    Clause(Clause),
}

impl Condition {
    pub fn equals(question_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Clause(Clause::new(question_id, Operator::Equals, value))
    }

    pub fn not_equals(question_id: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Clause(Clause::new(question_id, Operator::NotEquals, value))
    }

    pub fn all(clauses: Vec<Condition>) -> Self {
        Condition::Combinator(Combinator {
            kind: CombinatorKind::And,
            clauses,
        })
    }

    pub fn any(clauses: Vec<Condition>) -> Self {
        Condition::Combinator(Combinator {
            kind: CombinatorKind::Or,
            clauses,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum CombinatorKind {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Combinator {
    #[serde(rename = "type")]
    pub kind: CombinatorKind,
    #[serde(default)]
    pub clauses: Vec<Condition>,
}

/// Comparison operator. Unknown names survive parsing so evaluation can
/// fail closed on them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Operator {
    Equals,
    NotEquals,
    Unsupported(String),
}

impl From<String> for Operator {
    fn from(name: String) -> Self {
        match name.as_str() {
            "equals" => Operator::Equals,
            "not_equals" => Operator::NotEquals,
            _ => Operator::Unsupported(name),
        }
    }
}

impl From<Operator> for String {
    fn from(operator: Operator) -> Self {
        match operator {
            Operator::Equals => "equals".into(),
            Operator::NotEquals => "not_equals".into(),
            Operator::Unsupported(name) => name,
        }
    }
}

/// Leaf comparison against one stored answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Clause {
    pub question_id: String,
    #[schemars(with = "String")]
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl Clause {
    pub fn new(question_id: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            question_id: question_id.into(),
            operator,
            value: value.into(),
        }
    }

    /// Compares the coerced answer with the coerced target value.
    pub fn check(&self, answers: &AnswerMap) -> Result<bool, UnsupportedOperatorError> {
        let answer = answers
            .get(&self.question_id)
            .map(|answer| answer.coerced())
            .unwrap_or_default();
        let target = coerce_value(&self.value);
        match &self.operator {
            Operator::Equals => Ok(answer == target),
            Operator::NotEquals => Ok(answer != target),
            Operator::Unsupported(name) => Err(UnsupportedOperatorError {
                question_id: self.question_id.clone(),
                operator: name.clone(),
            }),
        }
    }
}

/// Evaluates a condition tree. Unsupported operators evaluate to `false`.
pub fn evaluate(condition: &Condition, answers: &AnswerMap) -> bool {
    match condition {
        Condition::Combinator(combinator) => match combinator.kind {
            CombinatorKind::And => combinator
                .clauses
                .iter()
                .all(|clause| evaluate(clause, answers)),
            CombinatorKind::Or => combinator
                .clauses
                .iter()
                .any(|clause| evaluate(clause, answers)),
        },
        Condition::Clause(clause) => clause.check(answers).unwrap_or_else(|error| {
            warn!(%error, "condition failed closed");
            false
        }),
    }
}

/// String form used for every comparison: absent and null are empty,
/// integral numbers drop any fractional part, arrays join with commas.
pub fn coerce_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(flag) => flag.to_string(),
        Value::String(text) => text.clone(),
        Value::Number(number) => match number.as_f64() {
            Some(float)
                if number.is_f64() && float.fract() == 0.0 && float.abs() < 1e15 =>
            {
                format!("{}", float as i64)
            }
            _ => number.to_string(),
        },
        Value::Array(values) => values
            .iter()
            .map(coerce_value)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::answers::AnswerValue;
    use serde_json::json;

    fn answers(pairs: &[(&str, AnswerValue)]) -> AnswerMap {
        pairs
            .iter()
            .map(|(id, value)| (id.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn empty_combinators_are_vacuous() {
        let empty = AnswerMap::new();
        assert!(evaluate(&Condition::all(vec![]), &empty));
        assert!(!evaluate(&Condition::any(vec![]), &empty));
    }

    #[test]
    fn equality_is_coerced_to_strings() {
        let map = answers(&[
            ("q1", AnswerValue::Text("1".into())),
            ("flag", AnswerValue::Flag(true)),
        ]);
        assert!(evaluate(&Condition::equals("q1", 1), &map));
        assert!(evaluate(&Condition::equals("q1", 1.0), &map));
        assert!(evaluate(&Condition::equals("flag", "true"), &map));
        assert!(evaluate(&Condition::equals("flag", true), &map));
        assert!(evaluate(&Condition::not_equals("q1", "2"), &map));
    }

    #[test]
    fn absent_answer_compares_as_empty() {
        let empty = AnswerMap::new();
        assert!(!evaluate(&Condition::equals("missing", "1"), &empty));
        assert!(evaluate(&Condition::not_equals("missing", "1"), &empty));
    }

    #[test]
    fn or_matches_either_value() {
        let condition = Condition::any(vec![
            Condition::equals("Q1", "1"),
            Condition::equals("Q1", "2"),
        ]);
        for (value, expected) in [("1", true), ("2", true), ("3", false)] {
            let map = answers(&[("Q1", AnswerValue::Text(value.into()))]);
            assert_eq!(evaluate(&condition, &map), expected, "Q1={value}");
        }
        assert!(!evaluate(&condition, &AnswerMap::new()));
    }

    #[test]
    fn nested_combinators_parse_and_evaluate() {
        let condition: Condition = serde_json::from_value(json!({
            "type": "AND",
            "clauses": [
                { "questionId": "a", "operator": "equals", "value": "1" },
                {
                    "type": "OR",
                    "clauses": [
                        { "questionId": "b", "operator": "equals", "value": 2 },
                        { "questionId": "c", "operator": "not_equals", "value": "x" }
                    ]
                }
            ]
        }))
        .expect("condition");
        let map = answers(&[
            ("a", AnswerValue::Text("1".into())),
            ("c", AnswerValue::Text("x".into())),
        ]);
        assert!(!evaluate(&condition, &map));
        let map = answers(&[
            ("a", AnswerValue::Text("1".into())),
            ("b", AnswerValue::Text("2".into())),
            ("c", AnswerValue::Text("x".into())),
        ]);
        assert!(evaluate(&condition, &map));
    }

    #[test]
    fn unsupported_operator_fails_closed() {
        let condition: Condition = serde_json::from_value(json!({
            "questionId": "a", "operator": "greater_than", "value": "1"
        }))
        .expect("condition");
        let map = answers(&[("a", AnswerValue::Text("5".into()))]);
        assert!(!evaluate(&condition, &map));
        let Condition::Clause(clause) = &condition else {
            panic!("expected clause");
        };
        let error = clause.check(&map).unwrap_err();
        assert_eq!(error.operator, "greater_than");
    }

    #[test]
    fn evaluation_does_not_touch_answers() {
        let map = answers(&[("a", AnswerValue::Text("1".into()))]);
        let before = map.clone();
        let condition = Condition::equals("a", "1");
        assert_eq!(evaluate(&condition, &map), evaluate(&condition, &map));
        assert_eq!(map, before);
    }

    #[test]
    fn logic_without_condition_is_true() {
        let logic: Logic = serde_json::from_value(json!({})).expect("logic");
        assert!(logic.evaluate(&AnswerMap::new()));
    }
}
