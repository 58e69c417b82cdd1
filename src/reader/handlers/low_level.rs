//! Handler forwarding raw attributes to a [`LowLevelPackageHandler`].
//!
//! [`LowLevelPackageHandler`]: crate::package::content::LowLevelPackageHandler

use crate::{
    package::content::LowLevelToken,
    reader::{context::AttributeHandlerContext, handlers::AttributeHandler, value::AttributeValue},
    Result,
};

/// One level of a low-level walk. The root level has no attribute of its own.
#[derive(Debug, Default)]
pub struct LowLevelHandler {
    attribute: Option<(u8, AttributeValue)>,
    parent: Option<LowLevelToken>,
    token: Option<LowLevelToken>,
}

impl LowLevelHandler {
    pub(crate) fn handle_attribute(
        &mut self,
        context: &mut AttributeHandlerContext<'_>,
        id: u8,
        value: AttributeValue,
    ) -> Result<Option<AttributeHandler>> {
        let token = context
            .low_level_handler()?
            .handle_attribute(id, &value, self.token)?;

        Ok(Some(AttributeHandler::LowLevel(LowLevelHandler {
            attribute: Some((id, value)),
            parent: self.token,
            token: Some(token),
        })))
    }

    pub(crate) fn finish(self, context: &mut AttributeHandlerContext<'_>) -> Result<()> {
        match (self.attribute, self.token) {
            (Some((id, value)), Some(token)) => context
                .low_level_handler()?
                .handle_attribute_done(id, &value, self.parent, token),
            _ => Ok(()),
        }
    }
}
