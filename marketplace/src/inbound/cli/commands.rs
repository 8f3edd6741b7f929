//! Command handlers. Each prints one JSON document, except `watch`, which
//! prints one JSON line per change.

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;
use tracing::debug;

use super::args::{
    BrokerSearchArgs, Command, ListingArgs, ListingCommand, OnboardingCommand, RequestCommand,
    ReviewCommand, SignupArgs, SocialLoginArgs,
};
use super::demo;
use super::state::CliState;
use crate::domain::ports::{ChangeFeedError, ChangeKind, NearbyQuery, StorageError};
use crate::domain::{
    AuthError, BrokerFilters, ChangeFilter, ChangeHandler, Subscription, Error, NewReview, NewServiceListing, NewServiceRequest, Resource,
    ReviewRating, Role, SignupRequest, SocialProfile, User, UserId,
};

/// Failure of a single command.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Service(#[from] Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Realtime(#[from] ChangeFeedError),
    #[error("writing output failed: {0}")]
    Output(#[from] std::io::Error),
    #[error("encoding output failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Session user without the token.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct UserView<'a> {
    id: &'a UserId,
    display_name: &'a str,
    email: Option<&'a str>,
    phone: Option<&'a str>,
    role: Role,
    avatar_url: Option<&'a str>,
}

impl<'a> From<&'a User> for UserView<'a> {
    fn from(user: &'a User) -> Self {
        Self {
            id: user.id(),
            display_name: user.display_name().as_ref(),
            email: user.email(),
            phone: user.phone(),
            role: user.role(),
            avatar_url: user.avatar_url(),
        }
    }
}

pub(super) fn emit<W: Write, T: Serialize + ?Sized>(out: &mut W, value: &T) -> Result<(), CliError> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

/// Data of a settled read, or the error it captured.
pub(super) fn settled<T: Default>(resource: Resource<T>) -> Result<T, Error> {
    match resource.error {
        Some(error) => Err(error),
        None => Ok(resource.data.unwrap_or_default()),
    }
}

fn signed_in(state: &CliState) -> Result<User, AuthError> {
    state.auth.current_user().ok_or(AuthError::NotAuthenticated)
}

fn session<W: Write>(state: &CliState, out: &mut W, user: &User) -> Result<(), CliError> {
    emit(
        out,
        &json!({
            "user": UserView::from(user),
            "redirect": state.auth.redirect_path(),
        }),
    )
}

/// Execute `command` against `state`, writing its result to `out`.
///
/// # Errors
///
/// Returns [`CliError`] when the operation fails or output cannot be written.
pub async fn run<W: Write>(state: &CliState, command: Command, out: &mut W) -> Result<(), CliError> {
    match command {
        Command::Login {
            identifier,
            password,
        } => {
            let user = state.auth.login(&identifier, &password).await?;
            session(state, out, &user)
        }
        Command::Signup(args) => signup(state, args, out).await,
        Command::SocialLogin(args) => social_login(state, args, out).await,
        Command::Logout => {
            state.auth.logout().await?;
            emit(out, &json!({ "signedIn": false, "redirect": state.auth.redirect_path() }))
        }
        Command::Whoami => {
            let user = state.auth.current_user();
            emit(
                out,
                &json!({
                    "user": user.as_ref().map(UserView::from),
                    "authenticated": state.auth.is_authenticated(),
                    "redirect": state.auth.redirect_path(),
                }),
            )
        }
        Command::SwitchRole { role } => {
            let user = state.auth.update_user_role(role).await?;
            session(state, out, &user)
        }
        Command::Exists { identifier } => {
            let exists = state.auth.check_user_exists(&identifier).await;
            emit(out, &json!({ "identifier": identifier, "exists": exists }))
        }
        Command::Brokers(args) => brokers(state, args, out).await,
        Command::Listings(command) => listings(state, command, out).await,
        Command::Requests(command) => requests(state, command, out).await,
        Command::Reviews(command) => reviews(state, command, out).await,
        Command::Route { path } => {
            let user = state.auth.current_user();
            let allowed = state.routes.can_access(&path, user.as_ref()).await;
            let redirect = (!allowed).then(|| state.auth.redirect_path());
            emit(
                out,
                &json!({ "path": path, "allowed": allowed, "redirect": redirect }),
            )
        }
        Command::Onboarding(command) => onboarding(state, command, out),
        Command::Translate { key, language } => {
            let language = match language {
                Some(language) => language,
                None => {
                    let first_run = state.onboarding.state()?;
                    if first_run.has_selected_language {
                        first_run.language
                    } else {
                        state.fallback_language
                    }
                }
            };
            let text = translations::translate(language, &key);
            emit(
                out,
                &json!({ "language": language, "key": key, "text": text }),
            )
        }
        Command::Watch { table, filter } => watch(state, table, filter, out).await,
        Command::Demo => demo::run(out).await,
    }
}

/// Writes each change as a compact JSON line. The first write failure is
/// kept and later changes are dropped.
struct ChangePrinter<'a, W> {
    table: &'a str,
    out: &'a mut W,
    failure: Option<CliError>,
}

impl<W: Write> ChangePrinter<'_, W> {
    fn print(&mut self, kind: ChangeKind, old: Option<Value>, new: Option<Value>) {
        if self.failure.is_some() {
            return;
        }
        let line = json!({ "table": self.table, "event": kind, "old": old, "new": new });
        let written = serde_json::to_writer(&mut *self.out, &line)
            .map_err(CliError::from)
            .and_then(|()| writeln!(self.out).map_err(CliError::from));
        if let Err(error) = written {
            self.failure = Some(error);
        }
    }
}

impl<W: Write> ChangeHandler<Value> for ChangePrinter<'_, W> {
    fn on_insert(&mut self, new: Value) {
        self.print(ChangeKind::Insert, None, Some(new));
    }

    fn on_update(&mut self, old: Option<Value>, new: Value) {
        self.print(ChangeKind::Update, old, Some(new));
    }

    fn on_delete(&mut self, old: Value) {
        self.print(ChangeKind::Delete, Some(old), None);
    }
}

async fn watch<W: Write>(
    state: &CliState,
    table: String,
    filter: Option<ChangeFilter>,
    out: &mut W,
) -> Result<(), CliError> {
    let mut subscription: Subscription<Value> =
        Subscription::open(Arc::clone(&state.changes), table.as_str(), filter)?;
    let mut printer = ChangePrinter {
        table: &table,
        out,
        failure: None,
    };
    let delivered = subscription.dispatch(&mut printer).await;
    debug!(%table, delivered, "change feed ended");
    printer.failure.map_or(Ok(()), Err)
}

async fn signup<W: Write>(state: &CliState, args: SignupArgs, out: &mut W) -> Result<(), CliError> {
    let request = SignupRequest::try_new(
        &args.name,
        args.email.as_deref(),
        args.phone.as_deref(),
        &args.password,
        args.role,
    )
    .map_err(AuthError::from)?
    .with_avatar_url(args.avatar_url);
    let user = state.auth.signup(request).await?;
    session(state, out, &user)
}

async fn social_login<W: Write>(
    state: &CliState,
    args: SocialLoginArgs,
    out: &mut W,
) -> Result<(), CliError> {
    let mut profile =
        SocialProfile::try_new(&args.email, &args.name, args.avatar_url).map_err(AuthError::from)?;
    if let Some(id_token) = args.id_token {
        profile = profile.with_id_token(id_token);
    }
    let user = state
        .auth
        .social_login(args.provider.into(), profile)
        .await?;
    session(state, out, &user)
}

async fn brokers<W: Write>(
    state: &CliState,
    args: BrokerSearchArgs,
    out: &mut W,
) -> Result<(), CliError> {
    let query = NearbyQuery {
        latitude: args.lat,
        longitude: args.lng,
        radius_km: args.radius_km,
        category: args.category,
    };
    let filters = BrokerFilters {
        query: args.query,
        service: args.service.into_option(),
        rating: args.rating.into_option(),
        price: args.price.into_option(),
        distance: args.distance.into_option(),
        verified_only: args.verified_only,
    };
    let searcher = state.auth.current_user();
    let found = state
        .discovery
        .search(searcher.as_ref().map(User::id), &query, &filters)
        .await?;
    debug!(count = found.len(), "printing brokers");
    emit(
        out,
        &json!({ "activeFilters": filters.active_count(), "brokers": found }),
    )
}

impl From<ListingArgs> for NewServiceListing {
    fn from(args: ListingArgs) -> Self {
        Self {
            category: args.category,
            title: args.title,
            description: args.description,
            price_min: args.price_min,
            price_max: args.price_max,
            location: args.location,
        }
    }
}

async fn listings<W: Write>(
    state: &CliState,
    command: ListingCommand,
    out: &mut W,
) -> Result<(), CliError> {
    match command {
        ListingCommand::List { broker } => {
            let broker = match broker {
                Some(broker) => broker,
                None => signed_in(state)?.id().clone(),
            };
            let listings = settled(state.catalogue.listings(&broker).await)?;
            emit(out, &listings)
        }
        ListingCommand::Create(args) => {
            let owner = signed_in(state)?;
            let listing = state.catalogue.create(&owner, args.into()).await?;
            emit(out, &listing)
        }
        ListingCommand::Update { id, listing } => {
            let owner = signed_in(state)?;
            let listing = state.catalogue.update(&owner, id, listing.into()).await?;
            emit(out, &listing)
        }
        ListingCommand::SetActive { id, active } => {
            let owner = signed_in(state)?;
            let listing = state.catalogue.set_active(&owner, id, active).await?;
            emit(out, &listing)
        }
        ListingCommand::Delete { id } => {
            let owner = signed_in(state)?;
            state.catalogue.delete(&owner, id).await?;
            emit(out, &json!({ "deleted": id }))
        }
    }
}

async fn requests<W: Write>(
    state: &CliState,
    command: RequestCommand,
    out: &mut W,
) -> Result<(), CliError> {
    let user = signed_in(state)?;
    let request = match command {
        RequestCommand::List => {
            let requests = settled(state.requests.requests_for(&user).await)?;
            return emit(out, &requests);
        }
        RequestCommand::Create {
            broker,
            service,
            title,
            description,
            price,
        } => {
            let draft = NewServiceRequest {
                title,
                description,
                broker_id: broker,
                service_id: service,
                proposed_price: price,
            };
            state.requests.create(&user, draft).await?
        }
        RequestCommand::Status { id, status } => {
            state.requests.update_status(&user, id, status).await?
        }
        RequestCommand::Cancel { id, reason } => state.requests.cancel(&user, id, reason).await?,
        RequestCommand::Respond { id, message, price } => {
            state.requests.respond(&user, id, message, price).await?
        }
    };
    emit(out, &request)
}

fn rating(value: u8) -> Result<ReviewRating, Error> {
    ReviewRating::new(value).map_err(|error| Error::invalid_request(error.to_string()))
}

async fn reviews<W: Write>(
    state: &CliState,
    command: ReviewCommand,
    out: &mut W,
) -> Result<(), CliError> {
    match command {
        ReviewCommand::List { reviewed } => {
            let reviews = settled(state.reviews.reviews_for(&reviewed).await)?;
            emit(out, &reviews)
        }
        ReviewCommand::Create {
            request,
            rating: value,
            comment,
            anonymous,
        } => {
            let reviewer = signed_in(state)?;
            let draft = NewReview {
                service_request_id: request,
                rating: rating(value)?,
                comment,
                anonymous,
            };
            let review = state.reviews.create(&reviewer, draft).await?;
            emit(out, &review)
        }
        ReviewCommand::Update {
            id,
            rating: value,
            comment,
        } => {
            let reviewer = signed_in(state)?;
            let review = state
                .reviews
                .update(&reviewer, id, rating(value)?, comment)
                .await?;
            emit(out, &review)
        }
        ReviewCommand::Rating { broker } => {
            let average = settled(state.reviews.broker_rating(&broker).await)?;
            emit(out, &json!({ "brokerId": broker, "rating": average }))
        }
    }
}

fn onboarding<W: Write>(
    state: &CliState,
    command: OnboardingCommand,
    out: &mut W,
) -> Result<(), CliError> {
    match command {
        OnboardingCommand::Show => {}
        OnboardingCommand::Language { language } => state.onboarding.select_language(language)?,
        OnboardingCommand::Complete => state.onboarding.complete()?,
        OnboardingCommand::Permission { state: permission } => {
            state.onboarding.set_location_permission(permission)?;
        }
    }
    let first_run = state.onboarding.state()?;
    emit(
        out,
        &json!({ "state": first_run, "nextStep": first_run.next_step() }),
    )
}

#[cfg(test)]
mod tests;
