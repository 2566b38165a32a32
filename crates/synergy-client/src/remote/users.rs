use chrono::Utc;

use synergy_shared::constants::COLLECTION_USERS;
use synergy_shared::{Identity, Result, UserProfile};
use synergy_store::Query;

use super::{Patch, RemoteAccess};

impl RemoteAccess {
    pub async fn get_user_profile(&self, uid: &str) -> Result<Option<UserProfile>> {
        self.get_by_id(uid).await
    }

    /// Create `users/{uid}` for a freshly registered identity. An existing
    /// profile is returned untouched.
    pub async fn create_user_profile(&self, identity: &Identity, name: &str) -> Result<UserProfile> {
        let now = Utc::now();
        let profile = UserProfile {
            id: identity.uid.clone(),
            email: identity.email.clone(),
            name: name.to_string(),
            avatar: None,
            created_at: now,
            updated_at: now,
        };
        let (profile, _) = self.create_with_id(&identity.uid, &profile).await?;
        Ok(profile)
    }

    pub async fn update_user_profile(&self, uid: &str, patch: &Patch) -> Result<UserProfile> {
        self.update(uid, patch).await
    }

    /// Profile lookup by exact email.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserProfile>> {
        let query = Query::collection(COLLECTION_USERS)
            .where_eq("email", email.trim())
            .limit(1);
        Ok(self.query::<UserProfile>(&query).await?.into_iter().next())
    }
}
