//! Output schemas handed to the completion provider.
//!
//! Written in the OpenAPI subset Gemini accepts for `responseSchema`.

use crate::provider::OutputSchema;
use serde_json::json;

pub const QUIZ_QUESTION_COUNT: usize = 10;
pub const MAX_RECOMMENDATIONS: usize = 10;
pub const NARRATION_CHAR_BUDGET: usize = 3000;

pub fn summary() -> OutputSchema {
    OutputSchema {
        name: "summary_notes",
        schema: json!({
            "type": "OBJECT",
            "properties": {
                "title": {"type": "STRING", "description": "Title of the note"},
                "summary": {"type": "STRING", "description": "Summary note in markdown"}
            },
            "required": ["title", "summary"]
        }),
    }
}

pub fn quiz() -> OutputSchema {
    let option = |letter: &str| json!({"type": "STRING", "description": format!("Option {}", letter)});
    OutputSchema {
        name: "quiz",
        schema: json!({
            "type": "OBJECT",
            "properties": {
                "title": {"type": "STRING", "description": "A suitable title for the quiz"},
                "questions": {
                    "type": "ARRAY",
                    "minItems": QUIZ_QUESTION_COUNT,
                    "maxItems": QUIZ_QUESTION_COUNT,
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "question": {"type": "STRING"},
                            "options": {
                                "type": "OBJECT",
                                "properties": {
                                    "A": option("A"),
                                    "B": option("B"),
                                    "C": option("C"),
                                    "D": option("D")
                                },
                                "required": ["A", "B", "C", "D"]
                            },
                            "correctAnswer": {"type": "STRING", "enum": ["A", "B", "C", "D"]},
                            "hint": {"type": "STRING", "description": "A small hint pointing in the right direction"},
                            "explaination": {"type": "STRING", "description": "Why the correct answer is correct"}
                        },
                        "required": ["question", "options", "correctAnswer", "hint", "explaination"]
                    }
                }
            },
            "required": ["title", "questions"]
        }),
    }
}

pub fn recommendations() -> OutputSchema {
    OutputSchema {
        name: "recommendations",
        schema: json!({
            "type": "OBJECT",
            "properties": {
                "recommendations": {
                    "type": "ARRAY",
                    "maxItems": MAX_RECOMMENDATIONS,
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "title": {"type": "STRING"},
                            "description": {"type": "STRING"},
                            "url": {"type": "STRING", "nullable": true}
                        },
                        "required": ["title", "description"]
                    }
                }
            },
            "required": ["recommendations"]
        }),
    }
}

pub fn mindmap() -> OutputSchema {
    OutputSchema {
        name: "mindmap",
        schema: json!({
            "type": "OBJECT",
            "properties": {
                "nodes": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "id": {"type": "STRING"},
                            "label": {"type": "STRING"},
                            "fillcolor": {"type": "STRING", "nullable": true}
                        },
                        "required": ["id", "label"]
                    }
                },
                "edges": {
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "source": {"type": "STRING"},
                            "target": {"type": "STRING"},
                            "label": {"type": "STRING", "nullable": true}
                        },
                        "required": ["source", "target"]
                    }
                },
                "central_node": {"type": "STRING"}
            },
            "required": ["nodes", "edges", "central_node"]
        }),
    }
}

pub fn narration() -> OutputSchema {
    OutputSchema {
        name: "podcast_script",
        schema: json!({
            "type": "OBJECT",
            "properties": {
                "topic": {"type": "STRING", "description": "Topic of the episode"},
                "script": {
                    "type": "STRING",
                    "description": format!("Narration script, at most {} characters", NARRATION_CHAR_BUDGET)
                }
            },
            "required": ["topic", "script"]
        }),
    }
}
