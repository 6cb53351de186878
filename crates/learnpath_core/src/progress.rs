//! crates/learnpath_core/src/progress.rs
//!
//! Full recomputation of a course's derived progress snapshot. Runs after
//! every mutation of any topic's completion state; never patched
//! incrementally, so the snapshot stays consistent even after interleaved
//! concurrent writes.

use chrono::Utc;

use crate::domain::{Course, CourseStatus, Progress};

/// The recomputed snapshot plus the course status it implies.
#[derive(Debug, Clone)]
pub struct RecomputedProgress {
    pub progress: Progress,
    pub status: CourseStatus,
}

/// Recomputes the whole progress object from the unit set.
///
/// - percent complete = round(100 * completed / total)
/// - current week = first week containing an incomplete topic, or the last
///   week once everything is done
/// - study minutes = sum of estimated minutes over completed topics
/// - a fully completed course becomes `Completed`; a `Generating` course
///   with any progress becomes `Active`; otherwise status is unchanged
pub fn recompute(course: &Course) -> RecomputedProgress {
    let mut total = 0usize;
    let mut completed = 0usize;
    let mut completed_ids = Vec::new();
    let mut minutes = 0u32;
    let mut current_week = 1u32;
    let mut first_incomplete_found = false;

    for week in &course.roadmap.syllabus {
        let mut week_has_incomplete = false;
        for topic in &week.topics {
            total += 1;
            if topic.is_completed {
                completed += 1;
                completed_ids.push(topic.id.clone());
                minutes += topic.estimated_minutes;
            } else {
                week_has_incomplete = true;
            }
        }
        if week_has_incomplete && !first_incomplete_found {
            current_week = week.week_number;
            first_incomplete_found = true;
        }
    }

    if !first_incomplete_found {
        if let Some(last) = course.roadmap.syllabus.last() {
            current_week = last.week_number;
        }
    }

    let percent = if total > 0 {
        ((completed as f64 / total as f64) * 100.0).round() as u8
    } else {
        0
    };

    let status = if percent == 100 && total > 0 {
        CourseStatus::Completed
    } else if percent > 0 && course.status == CourseStatus::Generating {
        CourseStatus::Active
    } else {
        course.status
    };

    RecomputedProgress {
        progress: Progress {
            percent_complete: percent,
            current_week,
            completed_topic_ids: completed_ids,
            total_study_minutes: minutes,
            last_study_session: Some(Utc::now()),
        },
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        LessonType, Preferences, ProjectScope, QuizStatus, Roadmap, Topic, WeekGroup,
    };
    use uuid::Uuid;

    fn topic(id: &str, completed: bool, minutes: u32) -> Topic {
        Topic {
            id: id.to_string(),
            title: id.to_string(),
            lesson_type: LessonType::Theory,
            estimated_minutes: minutes,
            markdown_content: None,
            is_completed: completed,
            quiz_status: if completed {
                QuizStatus::Passed
            } else {
                QuizStatus::Pending
            },
            quiz: Vec::new(),
            quiz_score: 0,
        }
    }

    fn course(status: CourseStatus, weeks: Vec<WeekGroup>) -> Course {
        Course {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            topic: "Python Mastery".to_string(),
            status,
            preferences: Preferences {
                level: "intermediate".to_string(),
                total_duration_weeks: weeks.len() as u32,
                goals: String::new(),
                project_scope: ProjectScope::Small,
            },
            roadmap: Roadmap {
                total_weeks: weeks.len() as u32,
                syllabus: weeks,
            },
            progress: Progress::default(),
        }
    }

    fn week(n: u32, topics: Vec<Topic>) -> WeekGroup {
        WeekGroup {
            week_number: n,
            title: format!("Week {n}"),
            topics,
        }
    }

    #[test]
    fn percent_is_a_pure_function_of_completion_counts() {
        let c = course(
            CourseStatus::Active,
            vec![week(
                1,
                vec![
                    topic("t1", true, 15),
                    topic("t2", false, 20),
                    topic("t3", false, 25),
                ],
            )],
        );
        let r = recompute(&c);
        assert_eq!(r.progress.percent_complete, 33);
        assert_eq!(r.progress.completed_topic_ids, vec!["t1".to_string()]);
        assert_eq!(r.progress.total_study_minutes, 15);
    }

    #[test]
    fn current_week_is_first_week_with_incomplete_topic() {
        let c = course(
            CourseStatus::Active,
            vec![
                week(1, vec![topic("t1", true, 15)]),
                week(2, vec![topic("t2", true, 15), topic("t3", false, 15)]),
                week(3, vec![topic("t4", false, 15)]),
            ],
        );
        assert_eq!(recompute(&c).progress.current_week, 2);
    }

    #[test]
    fn full_completion_marks_course_completed_and_points_at_last_week() {
        let c = course(
            CourseStatus::Active,
            vec![
                week(1, vec![topic("t1", true, 10)]),
                week(2, vec![topic("t2", true, 10)]),
            ],
        );
        let r = recompute(&c);
        assert_eq!(r.progress.percent_complete, 100);
        assert_eq!(r.progress.current_week, 2);
        assert_eq!(r.status, CourseStatus::Completed);
    }

    #[test]
    fn first_progress_activates_a_generating_course() {
        let c = course(
            CourseStatus::Generating,
            vec![week(1, vec![topic("t1", true, 10), topic("t2", false, 10)])],
        );
        assert_eq!(recompute(&c).status, CourseStatus::Active);
    }

    #[test]
    fn empty_roadmap_yields_zero_progress() {
        let c = course(CourseStatus::Generating, vec![]);
        let r = recompute(&c);
        assert_eq!(r.progress.percent_complete, 0);
        assert_eq!(r.status, CourseStatus::Generating);
    }
}
