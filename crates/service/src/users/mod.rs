//! User accounts: request validation, persistence seam and the business service.

pub mod domain;
pub mod repository;
pub mod repo {
    pub mod seaorm;
}
pub mod service;

pub use domain::{
    ListParams, ListQuery, LoginInput, LoginOutput, LoginRequest, RefreshRequest, RegisterInput, RegisterRequest,
    SortField, UpdateUserRequest, UserChanges, UserPage, UserView,
};
pub use repo::seaorm::SeaOrmUserRepository;
pub use repository::UserRepository;
pub use service::UserService;
