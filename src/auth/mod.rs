use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::error::{AuthError, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub uid: String,
    pub email: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AuthSubscription(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEvent {
    pub subscription: AuthSubscription,
    pub user: Option<User>,
}

pub trait AuthProvider {
    fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError>;

    fn sign_out(&self) -> Result<(), AuthError>;

    fn subscribe(&self, sink: Sender<AuthEvent>) -> Result<AuthSubscription, AuthError>;

    fn unsubscribe(&self, subscription: AuthSubscription);
}

#[derive(Debug)]
struct Account {
    uid: String,
    password: String,
}

#[derive(Debug, Default)]
struct LocalAuthInner {
    accounts: IndexMap<String, Account>,
    current: Option<User>,
    next_subscription: u64,
    listeners: IndexMap<AuthSubscription, Sender<AuthEvent>>,
}

impl LocalAuthInner {
    fn notify(&mut self) {
        let user = self.current.clone();
        self.listeners.retain(|subscription, sink| {
            sink.send(AuthEvent {
                subscription: *subscription,
                user: user.clone(),
            })
            .is_ok()
        });
    }
}

#[derive(Debug, Clone, Default)]
pub struct LocalAuth {
    inner: Arc<Mutex<LocalAuthInner>>,
}

impl LocalAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(self, email: &str, password: &str) -> Self {
        {
            let mut inner = self.inner.lock();
            let uid = format!("local-{}", inner.accounts.len() + 1);
            inner.accounts.insert(
                email.to_lowercase(),
                Account {
                    uid,
                    password: password.to_owned(),
                },
            );
        }
        self
    }

    pub fn current_user(&self) -> Option<User> {
        self.inner.lock().current.clone()
    }

    pub fn live_subscriptions(&self) -> usize {
        self.inner.lock().listeners.len()
    }
}

impl AuthProvider for LocalAuth {
    fn sign_in(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let mut inner = self.inner.lock();
        let key = email.trim().to_lowercase();
        let account = inner
            .accounts
            .get(&key)
            .filter(|account| account.password == password)
            .ok_or(AuthError::InvalidCredentials)?;
        let user = User {
            uid: account.uid.clone(),
            email: key,
        };
        inner.current = Some(user.clone());
        inner.notify();
        Ok(user)
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        let mut inner = self.inner.lock();
        if inner.current.take().is_some() {
            inner.notify();
        }
        Ok(())
    }

    fn subscribe(&self, sink: Sender<AuthEvent>) -> Result<AuthSubscription, AuthError> {
        let mut inner = self.inner.lock();
        inner.next_subscription += 1;
        let subscription = AuthSubscription(inner.next_subscription);
        let _ = sink.send(AuthEvent {
            subscription,
            user: inner.current.clone(),
        });
        inner.listeners.insert(subscription, sink);
        Ok(subscription)
    }

    fn unsubscribe(&self, subscription: AuthSubscription) {
        self.inner.lock().listeners.shift_remove(&subscription);
    }
}

#[derive(Debug)]
pub struct AuthGate {
    pub email: String,
    pub password: String,
    feedback: Option<ValidationError>,
    error: Option<AuthError>,
    user: Option<User>,
    subscription: Option<AuthSubscription>,
    sender: Sender<AuthEvent>,
    receiver: Receiver<AuthEvent>,
}

impl Default for AuthGate {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthGate {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self {
            email: String::new(),
            password: String::new(),
            feedback: None,
            error: None,
            user: None,
            subscription: None,
            sender,
            receiver,
        }
    }

    pub fn attach<A>(&mut self, provider: &A) -> Result<(), AuthError>
    where
        A: AuthProvider + ?Sized,
    {
        self.detach(provider);
        match provider.subscribe(self.sender.clone()) {
            Ok(subscription) => {
                self.subscription = Some(subscription);
                self.pump();
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%error, "auth state unavailable");
                self.error = Some(error.clone());
                Err(error)
            }
        }
    }

    pub fn detach<A>(&mut self, provider: &A)
    where
        A: AuthProvider + ?Sized,
    {
        if let Some(subscription) = self.subscription.take() {
            provider.unsubscribe(subscription);
        }
    }

    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        for event in self.receiver.try_iter() {
            if Some(event.subscription) != self.subscription {
                continue;
            }
            self.user = event.user;
            applied += 1;
        }
        applied
    }

    pub fn submit<A>(&mut self, provider: &A) -> Result<Option<User>, AuthError>
    where
        A: AuthProvider + ?Sized,
    {
        if self.email.trim().is_empty() || self.password.is_empty() {
            self.feedback = Some(ValidationError::MissingCredentials);
            return Ok(None);
        }
        self.feedback = None;
        match provider.sign_in(self.email.trim(), &self.password) {
            Ok(user) => {
                tracing::info!(uid = %user.uid, "signed in");
                self.error = None;
                self.password.clear();
                self.pump();
                Ok(Some(user))
            }
            Err(error) => {
                tracing::warn!(%error, "sign-in rejected");
                self.error = Some(error.clone());
                Err(error)
            }
        }
    }

    pub fn sign_out<A>(&mut self, provider: &A) -> Result<(), AuthError>
    where
        A: AuthProvider + ?Sized,
    {
        provider.sign_out()?;
        self.pump();
        Ok(())
    }

    pub fn current_user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    pub fn feedback(&self) -> Option<ValidationError> {
        self.feedback
    }

    pub fn error(&self) -> Option<&AuthError> {
        self.error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn provider() -> LocalAuth {
        LocalAuth::new().with_account("ann@example.com", "hunter2")
    }

    #[test]
    fn rejected_sign_in_keeps_the_form() {
        let auth = provider();
        let mut gate = AuthGate::new();
        gate.attach(&auth).unwrap();
        gate.email = "ann@example.com".into();
        gate.password = "wrong".into();
        assert_matches!(gate.submit(&auth), Err(AuthError::InvalidCredentials));
        assert_eq!(gate.error(), Some(&AuthError::InvalidCredentials));
        assert_eq!(gate.password, "wrong");
        assert!(gate.current_user().is_none());

        gate.password = "hunter2".into();
        let user = gate.submit(&auth).unwrap().unwrap();
        assert_eq!(gate.current_user(), Some(&user));
        assert!(gate.error().is_none());
        assert!(gate.password.is_empty());
    }

    #[test]
    fn blank_form_never_reaches_the_provider() {
        let auth = provider();
        let mut gate = AuthGate::new();
        assert_eq!(gate.submit(&auth).unwrap(), None);
        assert_eq!(gate.feedback(), Some(ValidationError::MissingCredentials));
        assert!(auth.current_user().is_none());
    }

    #[test]
    fn detached_gate_ignores_later_transitions() {
        let auth = provider();
        let mut gate = AuthGate::new();
        gate.attach(&auth).unwrap();
        auth.sign_in("ann@example.com", "hunter2").unwrap();
        gate.detach(&auth);
        assert_eq!(gate.pump(), 0);
        assert!(gate.current_user().is_none());
        assert_eq!(auth.live_subscriptions(), 0);
    }

    #[test]
    fn sign_out_clears_the_user() {
        let auth = provider();
        let mut gate = AuthGate::new();
        gate.attach(&auth).unwrap();
        gate.email = "ANN@example.com ".into();
        gate.password = "hunter2".into();
        gate.submit(&auth).unwrap();
        assert_eq!(gate.current_user().map(|u| u.email.as_str()), Some("ann@example.com"));
        gate.sign_out(&auth).unwrap();
        assert!(gate.current_user().is_none());
    }
}
