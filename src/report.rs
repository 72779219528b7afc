use std::collections::HashMap;
use std::fmt::Write;

use serde::Serialize;
use uuid::Uuid;

use crate::gpa::{self, round2};
use crate::models::{Assignment, Enrollment, GpaResult, Student};
use crate::scale::{strip_plus_minus, GradeScale};

pub fn build_transcript(
    student: &Student,
    result: &GpaResult,
    assignments: &HashMap<Uuid, Vec<Assignment>>,
    scale: &GradeScale,
    passing_grade: &str,
    semester: Option<&str>,
) -> String {
    let mut output = String::new();
    let term_label = semester.unwrap_or("all semesters");

    let _ = writeln!(output, "# Academic Transcript");
    let _ = writeln!(
        output,
        "{} ({}), {}",
        student.full_name, student.email, student.program
    );
    let _ = writeln!(output, "Covering {}", term_label);
    let _ = writeln!(output);
    let _ = writeln!(output, "## Courses");

    if result.breakdown.is_empty() {
        let _ = writeln!(output, "No courses recorded for this window.");
    }

    for course in result.breakdown.iter() {
        let average = course
            .average
            .map(|a| format!("{:.2}", a))
            .unwrap_or_else(|| "n/a".to_string());
        let letter = course.letter_grade.as_deref().unwrap_or("not graded");
        let transfer = if course.transfer { " (transfer)" } else { "" };

        let _ = writeln!(
            output,
            "- {} [{}]{}: {} credits, average {}, grade {}",
            course.course_code, course.semester, transfer, course.credits, average, letter
        );

        if let Some(graded) = assignments.get(&course.enrollment_id) {
            for (kind, mean) in gpa::average_by_type(graded) {
                let _ = writeln!(output, "  - {}: {:.2}", kind, mean);
            }
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Summary");
    let _ = writeln!(output, "- Graded credits: {}", result.graded_credits());
    let _ = writeln!(
        output,
        "- Earned credits (passing grade {}): {}",
        passing_grade,
        result.earned_credits(scale, passing_grade)
    );
    let _ = writeln!(output, "- Overall GPA: {:.2}", round2(result.gpa));

    output
}

#[derive(Debug, Serialize)]
struct GradeRow<'a> {
    course: &'a str,
    semester: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    name: &'a str,
    score: f64,
    letter_grade: &'a str,
    graded_date: chrono::NaiveDate,
}

/// Write every assignment of `enrollments` as CSV, one row per grade.
///
/// With `include_plus_minus` off, letters are exported without `+`/`-`.
pub fn export_grades_csv<W: std::io::Write>(
    writer: W,
    enrollments: &[Enrollment],
    assignments: &HashMap<Uuid, Vec<Assignment>>,
    scale: &GradeScale,
    include_plus_minus: bool,
) -> anyhow::Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    let mut written = 0usize;

    for enrollment in enrollments {
        let Some(graded) = assignments.get(&enrollment.id) else {
            continue;
        };

        for assignment in graded {
            let letter = scale.letter_and_point(assignment.score)?;
            let letter_grade = if include_plus_minus {
                letter.label.as_str()
            } else {
                strip_plus_minus(&letter.label)
            };
            csv_writer.serialize(GradeRow {
                course: &enrollment.course_code,
                semester: &enrollment.semester,
                kind: assignment.kind.as_str(),
                name: &assignment.name,
                score: assignment.score,
                letter_grade,
                graded_date: assignment.graded_date,
            })?;
            written += 1;
        }
    }

    csv_writer.flush()?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpa::{compute_gpa, GpaOptions};
    use crate::models::{AssignmentType, EnrollmentStatus};
    use chrono::NaiveDate;

    fn fixture() -> (Student, Vec<Enrollment>, HashMap<Uuid, Vec<Assignment>>) {
        let student = Student {
            id: Uuid::new_v4(),
            full_name: "Kiara Patel".to_string(),
            email: "kiara@example.com".to_string(),
            program: "Mathematics".to_string(),
        };
        let course = |code: &str, credits| Enrollment {
            id: Uuid::new_v4(),
            student_id: student.id,
            course_id: Uuid::new_v4(),
            course_code: code.to_string(),
            semester: "2026S".to_string(),
            credits,
            status: EnrollmentStatus::Active,
            transfer: None,
        };
        let enrollments = vec![course("MATH201", 4), course("ART100", 2)];

        let graded = |kind, name: &str, score| Assignment {
            id: Uuid::new_v4(),
            enrollment_id: enrollments[0].id,
            kind,
            name: name.to_string(),
            score,
            comments: None,
            graded_date: NaiveDate::from_ymd_opt(2026, 3, 4).unwrap(),
        };
        let mut assignments = HashMap::new();
        assignments.insert(
            enrollments[0].id,
            vec![
                graded(AssignmentType::Exam, "Midterm", 84.0),
                graded(AssignmentType::Quiz, "Quiz 1", 90.0),
                graded(AssignmentType::Exam, "Final", 78.0),
            ],
        );

        (student, enrollments, assignments)
    }

    #[test]
    fn transcript_lists_courses_and_summary() {
        let (student, enrollments, assignments) = fixture();
        let scale = GradeScale::default();
        let result = compute_gpa(
            student.id,
            &enrollments,
            &assignments,
            scale.entries(),
            &GpaOptions::default(),
        )
        .unwrap();

        let transcript = build_transcript(&student, &result, &assignments, &scale, "D", None);

        assert!(transcript.contains("Kiara Patel (kiara@example.com), Mathematics"));
        assert!(transcript.contains("- MATH201 [2026S]: 4 credits, average 84.00, grade A"));
        assert!(transcript.contains("  - exam: 81.00"));
        assert!(transcript.contains("  - quiz: 90.00"));
        assert!(transcript.contains("- ART100 [2026S]: 2 credits, average n/a, grade not graded"));
        assert!(transcript.contains("- Graded credits: 4"));
        assert!(transcript.contains("- Earned credits (passing grade D): 4"));
        assert!(transcript.contains("- Overall GPA: 4.00"));
    }

    #[test]
    fn transcript_handles_no_courses() {
        let (student, _, _) = fixture();
        let result = GpaResult {
            student_id: student.id,
            gpa: 0.0,
            breakdown: Vec::new(),
        };
        let transcript = build_transcript(
            &student,
            &result,
            &HashMap::new(),
            &GradeScale::default(),
            "D",
            Some("2025F"),
        );
        assert!(transcript.contains("Covering 2025F"));
        assert!(transcript.contains("No courses recorded"));
        assert!(transcript.contains("- Overall GPA: 0.00"));
    }

    #[test]
    fn exports_one_row_per_grade() {
        let (_, enrollments, assignments) = fixture();
        let mut buffer = Vec::new();
        let written = export_grades_csv(
            &mut buffer,
            &enrollments,
            &assignments,
            &GradeScale::default(),
            true,
        )
        .unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert_eq!(written, 3);
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("course,semester,type,name,score,letter_grade,graded_date")
        );
        assert_eq!(lines.next(), Some("MATH201,2026S,exam,Midterm,84.0,A,2026-03-04"));
        assert_eq!(text.lines().count(), 4);
        assert!(text.contains("MATH201,2026S,exam,Final,78.0,B+,2026-03-04"));
    }

    #[test]
    fn export_drops_plus_minus_when_disabled() {
        let (_, enrollments, assignments) = fixture();
        let mut buffer = Vec::new();
        export_grades_csv(
            &mut buffer,
            &enrollments,
            &assignments,
            &GradeScale::default(),
            false,
        )
        .unwrap();
        let text = String::from_utf8(buffer).unwrap();

        assert!(text.contains("MATH201,2026S,exam,Final,78.0,B,2026-03-04"));
        assert!(!text.contains("B+"));
    }
}
