use rla_db::Criteria;
use rla_security::SecurityContext;
use sea_orm::{EntityTrait, Select};

use crate::behavior::RowLevelAccess;
use crate::error::RlaError;

/// Extension trait to run row level access rules against a sea-orm select.
///
/// ```rust,ignore
/// let contacts = contact::Entity::find()
///     .restrict("Contact", Some(&access), &ctx)?
///     .all(&db)
///     .await?;
/// ```
pub trait RestrictedSelectExt<E: EntityTrait>: Sized {
    /// Apply the rule configured for `model`.
    ///
    /// With no [`RowLevelAccess`] the select is returned unchanged.
    ///
    /// The rule starts from empty criteria, so its filter is always ANDed
    /// with the filters already on the select. Unlike
    /// [`RowLevelAccess::on_before_select`] on a populated `Criteria`, an
    /// existing filter on the same column is never widened.
    ///
    /// # Errors
    ///
    /// Returns the rule's error; the select must not be executed then.
    fn restrict(
        self,
        model: &str,
        access: Option<&RowLevelAccess>,
        security_context: &SecurityContext,
    ) -> Result<Self, RlaError>;
}

impl<E> RestrictedSelectExt<E> for Select<E>
where
    E: EntityTrait,
{
    fn restrict(
        self,
        model: &str,
        access: Option<&RowLevelAccess>,
        security_context: &SecurityContext,
    ) -> Result<Self, RlaError> {
        let Some(access) = access else {
            return Ok(self);
        };
        let mut criteria = Criteria::new(E::default().table_name());
        access.on_before_select(model, &mut criteria, security_context)?;
        Ok(criteria.apply_to(self))
    }
}
