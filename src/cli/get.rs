use crate::core::models::{Recipe, RecipeId};
use crate::core::settings::Settings;
use crate::providers::{HttpRecipeSource, RecipeSource};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

pub async fn run(settings: &Settings, id: String, json: bool) -> Result<()> {
    let source = HttpRecipeSource::new(&settings.api)?;
    let id = RecipeId::new(id);

    let recipe = source
        .get_recipe(&id)
        .await
        .with_context(|| format!("Failed to fetch recipe {}", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        print_text_output(&recipe);
    }

    Ok(())
}

fn print_text_output(recipe: &Recipe) {
    if recipe.name.is_empty() {
        println!("{}", recipe.id);
    } else {
        println!("{} ({})", recipe.id, recipe.name);
    }

    match recipe.ready_image() {
        Some(url) => println!("  Image:   {}", url),
        None => println!("  Image:   pending"),
    }

    if let Some(created_at) = recipe.created_at {
        println!("  Created: {} ago", format_age(created_at, Utc::now()));
    }
}

fn format_age(created_at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(created_at);

    if duration.num_seconds() < 60 {
        return format!("{}s", duration.num_seconds().max(0));
    }

    let total_minutes = duration.num_minutes();
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes % (24 * 60)) / 60;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
