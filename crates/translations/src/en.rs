//! English copy. This table is the fallback for every other language.

pub(crate) static ENTRIES: &[(&str, &str)] = &[
    ("app.name", "Dalali Kiganjani"),
    ("app.tagline", "Find trusted brokers near you"),
    ("nav.home", "Home"),
    ("nav.findBroker", "Find Broker"),
    ("nav.messages", "Messages"),
    ("nav.requests", "Requests"),
    ("nav.profile", "Profile"),
    ("nav.dashboard", "Dashboard"),
    ("language.title", "Choose your language"),
    ("language.continue", "Continue"),
    ("onboarding.next", "Next"),
    ("onboarding.skip", "Skip"),
    ("onboarding.getStarted", "Get started"),
    ("permissions.location.title", "Allow location access"),
    ("permissions.location.body", "We use your location to show brokers nearby."),
    ("permissions.allow", "Allow"),
    ("permissions.deny", "Not now"),
    ("auth.login", "Log in"),
    ("auth.register", "Create account"),
    ("auth.logout", "Log out"),
    ("auth.emailOrPhone", "Email or phone number"),
    ("auth.password", "Password"),
    ("auth.otp.title", "Enter verification code"),
    ("auth.error.noAccount", "No account found. Please sign up first."),
    ("auth.error.invalidCredentials", "Invalid email/phone or password."),
    ("auth.error.duplicate", "An account with this email or phone already exists."),
    ("auth.error.notAuthenticated", "Please log in to continue."),
    ("broker.verified", "Verified"),
    ("broker.online", "Online"),
    ("broker.reviews", "reviews"),
    ("broker.contact", "Contact broker"),
    ("broker.become", "Become a broker"),
    ("filters.title", "Filters"),
    ("filters.reset", "Reset"),
    ("filters.service", "Service type"),
    ("filters.rating", "Rating"),
    ("filters.price", "Price range"),
    ("filters.distance", "Distance"),
    ("filters.verifiedOnly", "Verified brokers only"),
    ("filters.all", "All"),
    ("service.realEstate", "Real estate"),
    ("service.carSales", "Car sales"),
    ("service.carRental", "Car rental"),
    ("service.land", "Land"),
    ("service.commercial", "Commercial"),
    ("service.rental", "Rentals"),
    ("price.low", "Affordable"),
    ("price.medium", "Mid-range"),
    ("price.high", "Premium"),
    ("request.status.pending", "Pending"),
    ("request.status.accepted", "Accepted"),
    ("request.status.in_progress", "In progress"),
    ("request.status.completed", "Completed"),
    ("request.status.cancelled", "Cancelled"),
    ("request.cancel", "Cancel request"),
    ("review.write", "Write a review"),
    ("review.anonymous", "Post anonymously"),
    ("dashboard.listings", "My listings"),
    ("dashboard.orders", "Orders"),
    ("dashboard.marketing", "Marketing tools"),
    ("common.loading", "Loading..."),
    ("common.retry", "Try again"),
    ("common.dismiss", "Dismiss"),
];
