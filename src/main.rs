use std::env;
use std::process;

use recipe_ingest::model::{CandidateOrigin, DraftRecipe, ImageCandidate, PipelineOutcome};

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let generative = args.iter().any(|a| a == "--ai");
    let url = match args.iter().find(|a| !a.starts_with("--")) {
        Some(url) => url.clone(),
        None => {
            eprintln!("Usage: recipe-ingest <url> [--ai]");
            process::exit(2);
        }
    };

    match recipe_ingest::acquire_url(&url, generative).await {
        Ok(outcome) => {
            let failed = matches!(outcome, PipelineOutcome::Failed { .. });
            report(&outcome);
            if failed {
                process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(2);
        }
    }
}

fn report(outcome: &PipelineOutcome) {
    match outcome {
        PipelineOutcome::Exists { recipe } => {
            println!(
                "Recipe already stored as #{}: {}",
                recipe.id, recipe.recipe.title
            );
        }
        PipelineOutcome::Created { recipe, .. } => {
            println!("Created recipe #{}: {}", recipe.id, recipe.recipe.title);
            println!(
                "  {} ingredients, {} steps",
                recipe.recipe.ingredients.len(),
                recipe.recipe.instructions.len()
            );
            if let Some(image) = &recipe.recipe.image_url {
                println!("  image: {}", image);
            }
        }
        PipelineOutcome::NeedsSelection { draft, candidates } => {
            println!("Extracted \"{}\", awaiting image selection", draft.recipe.title);
            print_draft_note(draft);
            println!("  draft: {}", draft.draft_id);
            print_candidates(candidates);
        }
        PipelineOutcome::MultiRecipe { drafts, candidates } => {
            println!("Source contains {} recipes:", drafts.len());
            for draft in drafts {
                println!("  {} \"{}\"", draft.draft_id, draft.recipe.title);
                print_draft_note(draft);
            }
            print_candidates(candidates);
        }
        PipelineOutcome::AiRequired { message } => {
            println!("{}", message);
            println!("Re-run with --ai to extract with a generative provider.");
        }
        PipelineOutcome::Failed { error } => {
            eprintln!("Acquisition failed: {}", error);
        }
    }
}

fn print_draft_note(draft: &DraftRecipe) {
    if draft.truncated_source {
        println!("  note: source text was truncated; the recipe may be incomplete");
    }
}

fn print_candidates(candidates: &[ImageCandidate]) {
    if candidates.is_empty() {
        return;
    }
    println!("Image candidates:");
    for candidate in candidates {
        println!("  [{}] {}", origin_label(candidate), candidate.path);
    }
}

fn origin_label(candidate: &ImageCandidate) -> String {
    match candidate.origin {
        CandidateOrigin::Thumbnail => "thumbnail".to_string(),
        CandidateOrigin::Frame { timestamp_seconds } => {
            format!("frame at {}s", timestamp_seconds)
        }
        CandidateOrigin::Scraped => "scraped".to_string(),
        CandidateOrigin::Upload => "upload".to_string(),
    }
}
