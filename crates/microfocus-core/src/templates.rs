use serde::Serialize;

/// Preset task a user can start from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TaskTemplate {
    pub id: &'static str,
    pub title: &'static str,
    pub notes: &'static str,
    pub color: &'static str,
}

pub const TEMPLATES: &[TaskTemplate] = &[
    TaskTemplate {
        id: "writing",
        title: "Writing Session",
        notes: "Focus on content creation. Block social media and distractions.",
        color: "#8b5cf6",
    },
    TaskTemplate {
        id: "coding",
        title: "Coding Session",
        notes: "Deep work on code. Keep docs and Stack Overflow accessible.",
        color: "#0ea5e9",
    },
    TaskTemplate {
        id: "research",
        title: "Research Session",
        notes: "Academic/topic research. Allow multiple sources, block news/social.",
        color: "#10b981",
    },
    TaskTemplate {
        id: "design",
        title: "Design Session",
        notes: "UI/UX design work. Access Figma, Adobe tools, design resources.",
        color: "#f59e0b",
    },
    TaskTemplate {
        id: "reading",
        title: "Reading Session",
        notes: "Deep reading. Articles, papers, documentation only.",
        color: "#06b6d4",
    },
];

/// Look up a template by id (case-insensitive)
#[must_use]
pub fn find_template(id: &str) -> Option<&'static TaskTemplate> {
    TEMPLATES.iter().find(|t| t.id.eq_ignore_ascii_case(id.trim()))
}
