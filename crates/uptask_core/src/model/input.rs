//! Request inputs as received from clients.
//!
//! Every field is optional on the wire so that absence is reported as a
//! field error instead of a decode failure. `validate` runs every rule and
//! returns either the typed fields or the complete error set.

use super::project::ProjectFields;
use super::task::{Priority, TaskFields};
use super::validation::{
    required_date, required_email, required_password, required_text, FieldErrors,
};
use serde::Deserialize;

/// Create/update payload for a project.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub delivery_date: Option<String>,
    pub customer: Option<String>,
}

impl ProjectInput {
    pub fn validate(&self) -> Result<ProjectFields, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = required_text(&mut errors, "name", self.name.as_deref(), "name is required");
        let description = required_text(
            &mut errors,
            "description",
            self.description.as_deref(),
            "description is required",
        );
        let delivery_date = required_date(&mut errors, "deliveryDate", self.delivery_date.as_deref());
        let customer = required_text(
            &mut errors,
            "customer",
            self.customer.as_deref(),
            "customer is required",
        );

        match (name, description, delivery_date, customer) {
            (Some(name), Some(description), Some(delivery_date), Some(customer)) => {
                errors.into_result(ProjectFields {
                    name,
                    description,
                    delivery_date,
                    customer,
                })
            }
            _ => Err(errors),
        }
    }
}

/// Create/update payload for a task. `project` is only read on create.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub delivery_date: Option<String>,
    pub priority: Option<String>,
    pub project: Option<String>,
}

impl TaskInput {
    pub fn validate(&self) -> Result<TaskFields, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = required_text(&mut errors, "name", self.name.as_deref(), "name is required");
        let description = required_text(
            &mut errors,
            "description",
            self.description.as_deref(),
            "description is required",
        );
        let delivery_date = required_date(&mut errors, "deliveryDate", self.delivery_date.as_deref());
        let priority = required_text(
            &mut errors,
            "priority",
            self.priority.as_deref(),
            "priority is required",
        )
        .and_then(|value| match Priority::parse(&value) {
            Some(priority) => Some(priority),
            None => {
                errors.insert("priority", "priority must be low, medium or high");
                None
            }
        });

        match (name, description, delivery_date, priority) {
            (Some(name), Some(description), Some(delivery_date), Some(priority)) => {
                errors.into_result(TaskFields {
                    name,
                    description,
                    delivery_date,
                    priority,
                })
            }
            _ => Err(errors),
        }
    }

    /// Validates the fields required on creation, including the parent
    /// project reference.
    pub fn validate_for_create(&self) -> Result<(TaskFields, String), FieldErrors> {
        let mut errors = FieldErrors::new();
        let project = required_text(
            &mut errors,
            "project",
            self.project.as_deref(),
            "project is required",
        );
        match (self.validate(), project) {
            (Ok(fields), Some(project)) => Ok((fields, project)),
            (Ok(_), None) => Err(errors),
            (Err(field_errors), _) => {
                let mut merged = field_errors;
                if let Some(message) = errors.get("project") {
                    merged.insert("project", message);
                }
                Err(merged)
            }
        }
    }
}

/// Add-partner payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartnerInput {
    pub email: Option<String>,
    pub project: Option<String>,
}

/// Remove-partner payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartnerRef {
    #[serde(alias = "_id")]
    pub id: Option<String>,
}

/// Status toggle payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskRef {
    #[serde(alias = "_id")]
    pub id: Option<String>,
}

/// Signup payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignupInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

/// Validated signup fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupFields {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl SignupInput {
    pub fn validate(&self) -> Result<SignupFields, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = required_text(&mut errors, "name", self.name.as_deref(), "name is required");
        let email = required_email(&mut errors, "email", self.email.as_deref());
        let password = required_password(&mut errors, "password", self.password.as_deref());
        match (name, email, password) {
            (Some(name), Some(email), Some(password)) => errors.into_result(SignupFields {
                name,
                email,
                password,
            }),
            _ => Err(errors),
        }
    }
}

/// Login payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginInput {
    pub email: Option<String>,
    pub password: Option<String>,
}

impl LoginInput {
    /// Returns the normalized `(email, password)` pair.
    pub fn validate(&self) -> Result<(String, String), FieldErrors> {
        let mut errors = FieldErrors::new();
        let email = required_email(&mut errors, "email", self.email.as_deref());
        let password = required_password(&mut errors, "password", self.password.as_deref());
        match (email, password) {
            (Some(email), Some(password)) => errors.into_result((email, password)),
            _ => Err(errors),
        }
    }
}

/// Recovery request payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecoverInput {
    pub email: Option<String>,
}

impl RecoverInput {
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        match required_email(&mut errors, "email", self.email.as_deref()) {
            Some(email) => errors.into_result(email),
            None => Err(errors),
        }
    }
}

/// Confirmation or token-check payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenInput {
    pub token: Option<String>,
}

/// Password restore payload.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RestoreInput {
    pub token: Option<String>,
    pub password: Option<String>,
}

impl RestoreInput {
    /// Returns the validated new password.
    pub fn validate(&self) -> Result<String, FieldErrors> {
        let mut errors = FieldErrors::new();
        match required_password(&mut errors, "password", self.password.as_deref()) {
            Some(password) => errors.into_result(password),
            None => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ProjectInput, SignupInput, TaskInput};
    use crate::model::task::Priority;

    #[test]
    fn project_input_reports_all_missing_fields_together() {
        let errors = ProjectInput::default().validate().unwrap_err();
        let fields = errors.fields().collect::<Vec<_>>();
        assert_eq!(fields, vec!["customer", "deliveryDate", "description", "name"]);
    }

    #[test]
    fn task_input_rejects_unknown_priority() {
        let input = TaskInput {
            name: Some("Design".to_string()),
            description: Some("Mockups".to_string()),
            delivery_date: Some("2024-06-01".to_string()),
            priority: Some("urgent".to_string()),
            project: None,
        };
        let errors = input.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors.contains("priority"));
    }

    #[test]
    fn task_create_requires_project_reference() {
        let mut input = TaskInput {
            name: Some("Design".to_string()),
            description: Some("Mockups".to_string()),
            delivery_date: Some("2024-06-01".to_string()),
            priority: Some("High".to_string()),
            project: None,
        };
        let errors = input.validate_for_create().unwrap_err();
        assert!(errors.contains("project"));

        input.name = None;
        let errors = input.validate_for_create().unwrap_err();
        assert!(errors.contains("project"));
        assert!(errors.contains("name"));

        input.name = Some("Design".to_string());
        input.project = Some("abc".to_string());
        let (fields, project) = input.validate_for_create().unwrap();
        assert_eq!(fields.priority, Priority::High);
        assert_eq!(project, "abc");
    }

    #[test]
    fn signup_decodes_from_json_and_normalizes_email() {
        let input: SignupInput = serde_json::from_str(
            r#"{"name":"Ana","email":"ANA@example.com","password":"secret1"}"#,
        )
        .unwrap();
        let fields = input.validate().unwrap();
        assert_eq!(fields.email, "ana@example.com");
    }
}
