//! OpenAPI documentation

use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, health, imports, loans, members, settings, stats};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Campus Library API",
        version = "1.0.0",
        description = "Library lending service of the Campus school administration platform",
        license(name = "AGPL-3.0", url = "https://www.gnu.org/licenses/agpl-3.0.html")
    ),
    servers(
        (url = "/api/v1", description = "API v1")
    ),
    paths(
        // Health
        health::health_check,
        health::readiness_check,
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::adjust_copies,
        // Members
        members::list_members,
        members::get_member,
        members::create_member,
        members::deactivate_member,
        // Loans
        loans::issue_loan,
        loans::get_loan,
        loans::return_loan,
        loans::renew_loan,
        loans::mark_lost,
        loans::pay_fine,
        loans::member_loans,
        loans::overdue_loans,
        loans::sweep_overdue,
        // Imports
        imports::import_groups,
        imports::import_file,
        imports::import_template,
        // Stats
        stats::get_stats,
        // Settings
        settings::get_settings,
        settings::update_settings,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::CreateBook,
            crate::models::book::AdjustCopies,
            books::BookListResponse,
            // Members
            crate::models::member::Member,
            crate::models::member::MemberShort,
            crate::models::member::MemberType,
            crate::models::member::CreateMember,
            members::MemberListResponse,
            // Loans
            crate::models::loan::LoanTransaction,
            crate::models::loan::LoanDetails,
            crate::models::loan::LoanStatus,
            crate::models::loan::LendingPolicy,
            crate::models::loan::IssueLoan,
            crate::models::loan::ReturnLoan,
            crate::models::loan::MarkLost,
            loans::SweepResponse,
            // Imports
            crate::models::import::ImportRow,
            crate::models::import::RowStatus,
            crate::models::import::RowOutcome,
            crate::models::import::BatchReport,
            crate::models::import::BatchProgress,
            imports::GroupImportRequest,
            // Stats
            crate::services::stats::LendingStats,
            // Settings
            settings::SettingsResponse,
            settings::UpdateSettingsRequest,
            // Health
            health::HealthResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "books", description = "Catalog and availability"),
        (name = "members", description = "Borrowing memberships"),
        (name = "loans", description = "Loan lifecycle"),
        (name = "imports", description = "Bulk membership provisioning"),
        (name = "stats", description = "Statistics"),
        (name = "settings", description = "Lending policies")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
