//! JSON Schema for the configuration file shape
//!
//! The two polymorphic nodes (Step, WorkflowJob) accept either a string or
//! a single-key object, expressed as `oneOf`.

use serde_json::{json, Value};

/// Build the schema document for the config shape
pub fn schema() -> Value {
    json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://github.com/browser-pipes/plumber/plumber-config",
        "title": "Config",
        "type": "object",
        "properties": {
            "version": {
                "type": "string",
                "enum": ["2"],
                "description": "Configuration version, must be '2'"
            },
            "commands": {
                "type": "object",
                "description": "Reusable command definitions",
                "additionalProperties": { "$ref": "#/$defs/Command" }
            },
            "jobs": {
                "type": "object",
                "description": "Job definitions",
                "additionalProperties": { "$ref": "#/$defs/Job" }
            },
            "workflows": {
                "type": "object",
                "description": "Workflow definitions mapping jobs to URL patterns",
                "additionalProperties": { "$ref": "#/$defs/Workflow" }
            }
        },
        "required": ["version"],
        "$defs": {
            "Command": {
                "type": "object",
                "properties": {
                    "parameters": {
                        "type": "object",
                        "additionalProperties": { "$ref": "#/$defs/Parameter" }
                    },
                    "steps": {
                        "type": "array",
                        "items": { "$ref": "#/$defs/Step" }
                    }
                }
            },
            "Parameter": {
                "type": "object",
                "properties": {
                    "type": { "type": "string", "enum": ["string"] },
                    "default": { "type": "string" }
                }
            },
            "Job": {
                "type": "object",
                "properties": {
                    "steps": {
                        "type": "array",
                        "items": { "$ref": "#/$defs/Step" }
                    }
                }
            },
            "Step": {
                "oneOf": [
                    {
                        "type": "string",
                        "description": "Command name"
                    },
                    {
                        "type": "object",
                        "description": "'run' with a script, or a command with parameter bindings",
                        "minProperties": 1,
                        "maxProperties": 1,
                        "additionalProperties": {
                            "oneOf": [
                                {
                                    "type": "string",
                                    "description": "For 'run', the script to execute"
                                },
                                {
                                    "type": "object",
                                    "description": "Parameter bindings for the command",
                                    "additionalProperties": { "type": "string" }
                                }
                            ]
                        }
                    }
                ]
            },
            "Workflow": {
                "type": "object",
                "properties": {
                    "jobs": {
                        "type": "array",
                        "items": { "$ref": "#/$defs/WorkflowJob" }
                    }
                }
            },
            "WorkflowJob": {
                "oneOf": [
                    {
                        "type": "string",
                        "description": "Job name reference"
                    },
                    {
                        "type": "object",
                        "description": "Job reference with match rule and inline parameters",
                        "properties": {
                            "match": {
                                "type": "string",
                                "format": "regex",
                                "description": "Regex pattern to match URLs"
                            }
                        },
                        "additionalProperties": { "type": "string" }
                    }
                ]
            }
        }
    })
}

/// Pretty-printed schema for the `schema` subcommand
pub fn schema_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&schema())
}
