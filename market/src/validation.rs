use crate::{
    error::{MarketError, ValidationErrors},
    types::NewJob,
};

pub const MIN_TITLE_LEN: usize = 5;
pub const MIN_DESCRIPTION_LEN: usize = 20;

/// Checks the post-job form. An empty result means the input is acceptable.
pub fn validate_new_job(input: &NewJob) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if input.title.trim().chars().count() < MIN_TITLE_LEN {
        errors.add(
            "title",
            format!("Title must be at least {} characters", MIN_TITLE_LEN),
        );
    }
    if input.description.trim().chars().count() < MIN_DESCRIPTION_LEN {
        errors.add(
            "description",
            format!(
                "Description must be at least {} characters",
                MIN_DESCRIPTION_LEN
            ),
        );
    }

    let budget = input.budget;
    if !budget.min.is_finite() || budget.min < 0.0 {
        errors.add("budgetMin", "Minimum budget must be a non-negative number");
    }
    if !budget.max.is_finite() {
        errors.add("budgetMax", "Maximum budget must be a number");
    } else if budget.min.is_finite() && budget.max <= budget.min {
        errors.add(
            "budgetMax",
            "Maximum budget must be greater than the minimum budget",
        );
    }

    if normalize_tags(&input.categories).is_empty() {
        errors.add("categories", "Select at least one category");
    }
    if normalize_tags(&input.skills_required).is_empty() {
        errors.add("skillsRequired", "Add at least one required skill");
    }

    errors
}

/// Validates and returns the input with trimmed text and normalized tags.
pub fn prepare_job(input: NewJob) -> Result<NewJob, MarketError> {
    validate_new_job(&input).into_result()?;
    Ok(NewJob {
        title: input.title.trim().to_string(),
        description: input.description.trim().to_string(),
        budget: input.budget,
        categories: normalize_tags(&input.categories),
        skills_required: normalize_tags(&input.skills_required),
    })
}

/// Trims tags, drops blanks and repeats. First occurrence keeps its place.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

pub fn validate_user_name(name: &str) -> Result<(), MarketError> {
    let mut errors = ValidationErrors::new();
    if name.trim().is_empty() {
        errors.add("name", "Name is required");
    }
    errors.into_result()
}
