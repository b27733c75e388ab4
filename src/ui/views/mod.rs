mod change_detail;
mod changes;
mod companies;
mod company_detail;
mod dashboard;
mod login;
mod settings;

pub use change_detail::ChangeDetailView;
pub use changes::ChangesView;
pub use companies::CompaniesView;
pub use company_detail::CompanyDetailView;
pub use dashboard::DashboardView;
pub use login::LoginView;
pub use settings::SettingsView;
