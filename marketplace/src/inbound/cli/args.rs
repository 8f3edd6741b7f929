//! Command-line grammar.

use clap::{Args, Parser, Subcommand};
use translations::Language;
use uuid::Uuid;

use crate::domain::ports::{DEFAULT_LATITUDE, DEFAULT_LONGITUDE, DEFAULT_RADIUS_KM};
use crate::domain::{
    ChangeFilter, Criterion, DistanceBound, LocationPermission, PriceTier, RatingThreshold,
    RequestStatus, Role, ServiceType, SocialProvider, UserId,
};

/// Dalali Kiganjani marketplace client.
#[derive(Debug, Parser)]
#[command(name = "dalali", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in with an email address or phone number.
    Login { identifier: String, password: String },
    /// Create an account and sign in.
    Signup(SignupArgs),
    /// Sign in through a social provider profile.
    SocialLogin(SocialLoginArgs),
    /// End the session.
    Logout,
    /// Show the signed-in user and their landing page.
    Whoami,
    /// Switch the signed-in user's role.
    SwitchRole { role: Role },
    /// Report whether an account exists for an identifier.
    Exists { identifier: String },
    /// Search brokers near a location.
    Brokers(BrokerSearchArgs),
    /// Broker service listings.
    #[command(subcommand)]
    Listings(ListingCommand),
    /// Service requests for the signed-in user.
    #[command(subcommand)]
    Requests(RequestCommand),
    /// Reviews and broker ratings.
    #[command(subcommand)]
    Reviews(ReviewCommand),
    /// Check whether the session may open a page.
    Route { path: String },
    /// First-run state.
    #[command(subcommand)]
    Onboarding(OnboardingCommand),
    /// Look up interface copy.
    Translate {
        key: String,
        #[arg(long)]
        language: Option<Language>,
    },
    /// Print row changes on a table, one JSON line each, until the feed ends.
    Watch {
        table: String,
        /// `column=eq.value`.
        #[arg(long)]
        filter: Option<ChangeFilter>,
    },
    /// Run a booking end to end against throwaway in-memory adapters.
    Demo,
}

#[derive(Debug, Args)]
pub struct SignupArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub email: Option<String>,
    #[arg(long)]
    pub phone: Option<String>,
    #[arg(long)]
    pub password: String,
    #[arg(long, default_value = "client")]
    pub role: Role,
    #[arg(long)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct SocialLoginArgs {
    #[arg(value_enum)]
    pub provider: ProviderArg,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub avatar_url: Option<String>,
    /// Provider-issued ID token, required by the Supabase backend.
    #[arg(long)]
    pub id_token: Option<String>,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ProviderArg {
    Google,
    Facebook,
    Apple,
}

impl From<ProviderArg> for SocialProvider {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Google => Self::Google,
            ProviderArg::Facebook => Self::Facebook,
            ProviderArg::Apple => Self::Apple,
        }
    }
}

#[derive(Debug, Args)]
pub struct BrokerSearchArgs {
    /// Free text matched against names and specialties.
    #[arg(long, default_value = "")]
    pub query: String,
    /// A service type, or `all`.
    #[arg(long, default_value = "all")]
    pub service: Criterion<ServiceType>,
    /// `3+`, `4+`, `4.5+` or `all`.
    #[arg(long, default_value = "all")]
    pub rating: Criterion<RatingThreshold>,
    /// `low`, `medium`, `high` or `all`.
    #[arg(long, default_value = "all")]
    pub price: Criterion<PriceTier>,
    /// `nearby`, `5km`, `10km`, `20km` or `all`.
    #[arg(long, default_value = "all")]
    pub distance: Criterion<DistanceBound>,
    #[arg(long)]
    pub verified_only: bool,
    #[arg(long, default_value_t = DEFAULT_LATITUDE, allow_hyphen_values = true)]
    pub lat: f64,
    #[arg(long, default_value_t = DEFAULT_LONGITUDE, allow_hyphen_values = true)]
    pub lng: f64,
    #[arg(long, default_value_t = DEFAULT_RADIUS_KM)]
    pub radius_km: f64,
    /// Category passed to the directory before filtering.
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum ListingCommand {
    /// Listings of a broker, the signed-in broker by default.
    List {
        #[arg(long)]
        broker: Option<UserId>,
    },
    Create(ListingArgs),
    Update {
        id: Uuid,
        #[command(flatten)]
        listing: ListingArgs,
    },
    /// Show or hide a listing.
    SetActive {
        id: Uuid,
        #[arg(action = clap::ArgAction::Set)]
        active: bool,
    },
    Delete { id: Uuid },
}

#[derive(Debug, Args)]
pub struct ListingArgs {
    #[arg(long)]
    pub category: String,
    #[arg(long)]
    pub title: String,
    #[arg(long, default_value = "")]
    pub description: String,
    #[arg(long)]
    pub price_min: Option<u64>,
    #[arg(long)]
    pub price_max: Option<u64>,
    #[arg(long)]
    pub location: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum RequestCommand {
    /// Requests the signed-in user sent (clients) or received (brokers).
    List,
    Create {
        #[arg(long)]
        broker: UserId,
        #[arg(long)]
        service: Uuid,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        price: Option<u64>,
    },
    /// Move a request through its lifecycle.
    Status { id: Uuid, status: RequestStatus },
    Cancel {
        id: Uuid,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Accept a request as its broker.
    Respond {
        id: Uuid,
        #[arg(long)]
        message: Option<String>,
        #[arg(long)]
        price: Option<u64>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ReviewCommand {
    /// Reviews written about a user.
    List { reviewed: UserId },
    Create {
        #[arg(long)]
        request: Uuid,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
        #[arg(long)]
        comment: Option<String>,
        #[arg(long)]
        anonymous: bool,
    },
    Update {
        id: Uuid,
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=5))]
        rating: u8,
        #[arg(long)]
        comment: Option<String>,
    },
    /// Average rating of a broker.
    Rating { broker: UserId },
}

#[derive(Debug, Subcommand)]
pub enum OnboardingCommand {
    Show,
    Language { language: Language },
    Complete,
    Permission { state: LocationPermission },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn grammar_is_consistent() {
        Cli::command().debug_assert();
    }

    #[rstest]
    fn broker_search_accepts_filter_names() {
        let cli = Cli::try_parse_from([
            "dalali",
            "brokers",
            "--service",
            "car-rental",
            "--rating",
            "4.5+",
            "--distance",
            "5km",
            "--lat",
            "-6.8",
        ])
        .expect("valid arguments");
        let Command::Brokers(args) = cli.command else {
            panic!("expected broker search");
        };
        assert_eq!(args.service.into_option(), Some(ServiceType::CarRental));
        assert_eq!(args.rating.into_option(), Some(RatingThreshold::FourHalfPlus));
        assert_eq!(args.distance.into_option(), Some(DistanceBound::FiveKm));
        assert_eq!(args.price.into_option(), None);
        assert!((args.lat + 6.8).abs() < f64::EPSILON);
        assert!((args.lng - DEFAULT_LONGITUDE).abs() < f64::EPSILON);
    }

    #[rstest]
    fn broker_search_treats_all_as_unset() {
        let cli = Cli::try_parse_from([
            "dalali",
            "brokers",
            "--service",
            "all",
            "--rating",
            "all",
            "--price",
            "all",
            "--distance",
            "all",
        ])
        .expect("valid arguments");
        let Command::Brokers(args) = cli.command else {
            panic!("expected broker search");
        };
        assert_eq!(args.service, Criterion(None));
        assert_eq!(args.rating, Criterion(None));
        assert_eq!(args.price, Criterion(None));
        assert_eq!(args.distance, Criterion(None));
    }

    #[rstest]
    fn watch_takes_a_table_and_an_equality_filter() {
        let cli = Cli::try_parse_from([
            "dalali",
            "watch",
            "service_requests",
            "--filter",
            "broker_id=eq.42",
        ])
        .expect("valid arguments");
        let Command::Watch { table, filter } = cli.command else {
            panic!("expected watch");
        };
        assert_eq!(table, "service_requests");
        assert_eq!(filter, Some(ChangeFilter::eq("broker_id", "42")));
    }

    #[rstest]
    #[case(&["dalali", "brokers", "--service", "boats"])]
    #[case(&["dalali", "watch", "reviews", "--filter", "rating>4"])]
    #[case(&["dalali", "reviews", "create", "--request", "00000000-0000-0000-0000-000000000000", "--rating", "6"])]
    #[case(&["dalali", "switch-role", "admin"])]
    #[case(&["dalali", "requests", "status", "not-a-uuid", "completed"])]
    fn rejects_invalid_values(#[case] argv: &[&str]) {
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
