//! crates/learnpath_core/src/gate.rs
//!
//! The flattened topic index, the linear-unlock rule, and quiz grading.
//! All of this is pure: it reads a `Course` snapshot and returns values.
//! Lookup is an indexed view built once per request rather than an ad-hoc
//! scan of the nested week/topic arrays on every access.

use std::collections::HashMap;

use crate::domain::{Course, QuizQuestion, Topic};

/// Where a topic lives inside the roadmap, plus its global position in the
/// course-wide linear order used for gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TopicLocation {
    pub week_index: usize,
    pub topic_index: usize,
    pub global_position: usize,
}

/// A flattened, ordered view over every topic in a course.
pub struct CourseIndex<'a> {
    course: &'a Course,
    by_id: HashMap<&'a str, TopicLocation>,
    order: Vec<&'a str>,
}

impl<'a> CourseIndex<'a> {
    pub fn build(course: &'a Course) -> Self {
        let mut by_id = HashMap::new();
        let mut order = Vec::new();
        for (wi, week) in course.roadmap.syllabus.iter().enumerate() {
            for (ti, topic) in week.topics.iter().enumerate() {
                by_id.insert(
                    topic.id.as_str(),
                    TopicLocation {
                        week_index: wi,
                        topic_index: ti,
                        global_position: order.len(),
                    },
                );
                order.push(topic.id.as_str());
            }
        }
        Self { course, by_id, order }
    }

    pub fn locate(&self, topic_id: &str) -> Option<TopicLocation> {
        self.by_id.get(topic_id).copied()
    }

    pub fn topic(&self, topic_id: &str) -> Option<&'a Topic> {
        let loc = self.locate(topic_id)?;
        Some(&self.course.roadmap.syllabus[loc.week_index].topics[loc.topic_index])
    }

    fn topic_at(&self, global_position: usize) -> &'a Topic {
        let id = self.order[global_position];
        self.topic(id).expect("index and roadmap out of sync")
    }

    /// Applies the linear-unlock rule: the topic at global position `i > 0`
    /// is accessible only if the topic at `i - 1` is completed. A locked
    /// topic is a normal outcome carrying the blocking topic's title, not
    /// a fault.
    pub fn check_access(&self, topic_id: &str) -> AccessDecision {
        let Some(loc) = self.locate(topic_id) else {
            return AccessDecision::NotFound;
        };
        if loc.global_position == 0 {
            return AccessDecision::Granted;
        }
        let previous = self.topic_at(loc.global_position - 1);
        if previous.is_completed {
            AccessDecision::Granted
        } else {
            AccessDecision::Locked {
                blocking_title: previous.title.clone(),
            }
        }
    }
}

/// Result of a gating check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    Locked { blocking_title: String },
    NotFound,
}

//=========================================================================================
// Quiz Grading
//=========================================================================================

/// Pass threshold, inclusive: a score of exactly 70 passes.
pub const PASS_THRESHOLD: u8 = 70;

/// Per-question grading detail returned to the caller so the client can
/// show which answers were wrong and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionResult {
    pub question_index: usize,
    pub is_correct: bool,
    pub user_selected: Option<String>,
    pub correct_answer: String,
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizReport {
    pub passed: bool,
    pub score: u8,
    pub results: Vec<QuestionResult>,
}

/// Grades a submission against the stored question set. Pure: identical
/// inputs always yield an identical report. A missing answer counts as
/// incorrect.
pub fn grade_quiz(questions: &[QuizQuestion], answers: &[String]) -> QuizReport {
    let total = questions.len();
    let mut correct = 0usize;

    let results = questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            let selected = answers.get(i).cloned();
            let is_correct = selected.as_deref() == Some(q.correct_answer.as_str());
            if is_correct {
                correct += 1;
            }
            QuestionResult {
                question_index: i,
                is_correct,
                user_selected: selected,
                correct_answer: q.correct_answer.clone(),
                explanation: q.explanation.clone(),
            }
        })
        .collect();

    let score = if total == 0 {
        0
    } else {
        ((correct as f64 / total as f64) * 100.0).round() as u8
    };

    QuizReport {
        passed: score >= PASS_THRESHOLD,
        score,
        results,
    }
}
