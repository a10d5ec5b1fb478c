//! The fixed catalog of applications whose logs are simulated.

use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// An application and the services it is made of.
pub struct ApplicationContext {
    application: &'static str,
    services: &'static [&'static str],
}

impl ApplicationContext {
    /// Create a new [`ApplicationContext`].
    ///
    /// # Panics
    ///
    /// Panics if `services` is empty. In a const context that is a compile
    /// error.
    #[must_use]
    pub const fn new(application: &'static str, services: &'static [&'static str]) -> Self {
        assert!(!services.is_empty(), "an application needs a service");
        Self {
            application,
            services,
        }
    }

    /// The application name.
    #[must_use]
    pub fn application(&self) -> &'static str {
        self.application
    }

    /// The services of this application, never empty.
    #[must_use]
    pub fn services(&self) -> &'static [&'static str] {
        self.services
    }

    /// Draw one of the services uniformly.
    pub fn choose_service<R>(&self, rng: &mut R) -> &'static str
    where
        R: Rng + ?Sized,
    {
        self.services[rng.random_range(0..self.services.len())]
    }
}

/// Every application an emitter simulates.
pub const APPLICATIONS: [ApplicationContext; 5] = [
    ApplicationContext::new(
        "user-service",
        &["authentication", "profile", "preferences"],
    ),
    ApplicationContext::new(
        "payment-service",
        &["billing", "transaction", "fraud-detection"],
    ),
    ApplicationContext::new("inventory-service", &["stock", "warehouse", "shipping"]),
    ApplicationContext::new("notification-service", &["email", "sms", "push"]),
    ApplicationContext::new(
        "analytics-service",
        &["tracking", "reporting", "insights"],
    ),
];

/// Draw one application from [`APPLICATIONS`] uniformly.
pub fn choose<R>(rng: &mut R) -> &'static ApplicationContext
where
    R: Rng + ?Sized,
{
    &APPLICATIONS[rng.random_range(0..APPLICATIONS.len())]
}
