//! Signup form validation.
//!
//! Errors are reported per field so a caller can show each message next to its input.
//! Validation only gates submission; nothing here talks to the backend.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::Role;

/// Fields of the signup form, in display order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SignupField {
    Name,
    Role,
    School,
    Grade,
    ClassNum,
    Phone,
    ChildName,
}

impl SignupField {
    pub fn label(self) -> &'static str {
        match self {
            Self::Name => "이름",
            Self::Role => "역할",
            Self::School => "학교",
            Self::Grade => "학년",
            Self::ClassNum => "반",
            Self::Phone => "전화번호",
            Self::ChildName => "자녀 이름",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupForm {
    pub name: String,
    pub role: Option<Role>,
    pub school: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub grade: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_num: Option<u32>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub phone: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub child_name: String,
}

/// Field-level messages produced by [`SignupForm::validate`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ValidationErrors(BTreeMap<SignupField, String>);

impl ValidationErrors {
    fn add(&mut self, field: SignupField, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: SignupField) -> Option<&str> {
        self.0.get(&field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = SignupField> + '_ {
        self.0.keys().copied()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in &self.0 {
            if !first {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", field.label(), message)?;
            first = false;
        }
        Ok(())
    }
}

/// Accepts Korean mobile and landline numbers with or without hyphens.
pub fn is_valid_phone(phone: &str) -> bool {
    let phone = phone.trim();
    if !phone.chars().all(|ch| ch.is_ascii_digit() || ch == '-') {
        return false;
    }
    if phone.starts_with('-') || phone.ends_with('-') || phone.contains("--") {
        return false;
    }
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    digits.starts_with('0') && (9..=11).contains(&digits.len())
}

impl SignupForm {
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::default();

        if self.name.trim().is_empty() {
            errors.add(SignupField::Name, "이름을 입력하세요");
        }
        if self.school.trim().is_empty() {
            errors.add(SignupField::School, "학교를 입력하세요");
        }

        match self.role {
            None => errors.add(SignupField::Role, "역할을 선택하세요"),
            Some(Role::Student) => {
                match self.grade {
                    Some(1..=6) => {}
                    Some(_) => errors.add(SignupField::Grade, "학년은 1에서 6 사이여야 합니다"),
                    None => errors.add(SignupField::Grade, "학년을 입력하세요"),
                }
                match self.class_num {
                    Some(class) if class > 0 => {}
                    Some(_) => errors.add(SignupField::ClassNum, "반은 1 이상이어야 합니다"),
                    None => errors.add(SignupField::ClassNum, "반을 입력하세요"),
                }
            }
            Some(Role::Parent) => {
                if self.child_name.trim().is_empty() {
                    errors.add(SignupField::ChildName, "자녀 이름을 입력하세요");
                }
            }
            Some(Role::Teacher) => {}
        }

        if !self.phone.trim().is_empty() && !is_valid_phone(&self.phone) {
            errors.add(SignupField::Phone, "전화번호 형식이 올바르지 않습니다");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
