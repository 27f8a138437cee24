use folio_auth::Principal;

/// Authentication outcome for a request.
///
/// Always present in request extensions once the auth middleware has run;
/// `principal` is `None` for anonymous requests so that authorization guards
/// can fail closed with `401`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct PrincipalContext {
    principal: Option<Principal>,
}

impl PrincipalContext {
    pub fn new(principal: Option<Principal>) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }
}
