use std::{env, fs, path::PathBuf};

use ts_rs::TS;

fn generate_types_content() -> String {
    let header = "// This file was generated by `crates/server/src/bin/generate_types.rs`.\n\n// Do not edit this file manually.";
    let decls: Vec<String> = vec![
        db::models::discipline::Discipline::decl(),
        db::models::catalog::ColumnKind::decl(),
        db::models::intake_session::IntakeSessionView::decl(),
        db::models::intake_session::UpsertIntakeSession::decl(),
        db::models::dashboard_layout::DashboardLayout::decl(),
        db::models::dashboard_layout::SaveDashboardLayout::decl(),
        services::services::quiz_flow::NextStep::decl(),
        services::services::quiz_flow::QuizState::decl(),
        services::services::normalized_profile::BudgetRange::decl(),
        services::services::normalized_profile::HomeProfile::decl(),
        services::services::normalized_profile::HeatPumpProfile::decl(),
        services::services::normalized_profile::SolarProfile::decl(),
        services::services::normalized_profile::BatteryProfile::decl(),
        services::services::normalized_profile::InsulationProfile::decl(),
        services::services::normalized_profile::AircoProfile::decl(),
        services::services::normalized_profile::HeatDistributionProfile::decl(),
        services::services::normalized_profile::DisciplineProfiles::decl(),
        services::services::normalized_profile::NormalizedProfile::decl(),
        services::services::intake::SaveIntakeRequest::decl(),
        services::services::intake::CompleteIntakeRequest::decl(),
        services::services::intake::CompleteIntakeResponse::decl(),
        services::services::intake::ProfileView::decl(),
        services::services::catalog_query::FilterValue::decl(),
        services::services::catalog_query::SortDirection::decl(),
        services::services::catalog_query::Pagination::decl(),
        services::services::catalog_query::ValueCount::decl(),
        services::services::catalog_query::FieldMetadata::decl(),
        services::services::recommendations::SpecEntry::decl(),
        services::services::recommendations::RecommendationWidget::decl(),
        services::services::recommendations::RecommendationSet::decl(),
        server::routes::intake::NextStepRequest::decl(),
        server::routes::intake::NextStepResponse::decl(),
        utils::response::ApiResponse::<()>::decl(),
    ];

    let body = decls
        .into_iter()
        .map(|d| {
            let trimmed = d.trim_start();
            if trimmed.starts_with("export") {
                d
            } else {
                format!("export {trimmed}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("{header}\n\n{body}\n")
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let check_mode = args.iter().any(|arg| arg == "--check");

    let shared_path = PathBuf::from("shared");
    let types_path = shared_path.join("types.ts");
    let generated = generate_types_content();

    if check_mode {
        match fs::read_to_string(&types_path) {
            Ok(current) if current == generated => {
                println!("✅ shared/types.ts is up to date.");
                std::process::exit(0);
            }
            _ => {
                eprintln!("❌ shared/types.ts is not up to date. Run `cargo run --bin generate_types` and commit the changes.");
                std::process::exit(1);
            }
        }
    }

    if let Err(e) = fs::create_dir_all(&shared_path).and_then(|_| fs::write(&types_path, generated)) {
        eprintln!("Failed to write {}: {e}", types_path.display());
        std::process::exit(1);
    }
    println!("✅ TypeScript types generated in {}", types_path.display());
}
