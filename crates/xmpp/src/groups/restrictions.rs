use xabber_core::GroupChat;

use crate::error::ParseError;
use crate::forms::{self, DataForm};
use crate::ns;
use crate::stanza::{IqHeader, IqRequest, IqType};
use crate::xml::{XmlBuilder, XmlCursor};

/// Asks a group for the restrictions applied to newly joined members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDefaultRestrictionsQueryIq {
    header: IqHeader,
}

impl GroupDefaultRestrictionsQueryIq {
    pub fn new(group: &GroupChat) -> Self {
        Self {
            header: IqHeader::new(IqType::Get, group.destination()),
        }
    }
}

impl IqRequest for GroupDefaultRestrictionsQueryIq {
    const ELEMENT: &'static str = "query";
    const NAMESPACE: &'static str = ns::GROUPS_DEFAULT_RIGHTS;

    fn header(&self) -> &IqHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut IqHeader {
        &mut self.header
    }

    fn write_child(&self, _xml: &mut XmlBuilder) {}
}

/// Result of a default restrictions query.
///
/// `form` is `None` when the reply carried no data form at all, which is not
/// the same as a form without fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDefaultRestrictionsResult {
    pub form: Option<DataForm>,
}

impl GroupDefaultRestrictionsResult {
    pub(crate) fn parse(cursor: &mut XmlCursor<'_>) -> Result<Self, ParseError> {
        Ok(Self {
            form: forms::scan_for_form(cursor)?,
        })
    }
}

/// Submits changed default restrictions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSetDefaultRestrictionsIq {
    header: IqHeader,
    form: DataForm,
}

impl GroupSetDefaultRestrictionsIq {
    pub fn new(group: &GroupChat, form: DataForm) -> Self {
        Self {
            header: IqHeader::new(IqType::Set, group.destination()),
            form,
        }
    }

    pub fn form(&self) -> &DataForm {
        &self.form
    }
}

impl IqRequest for GroupSetDefaultRestrictionsIq {
    const ELEMENT: &'static str = "query";
    const NAMESPACE: &'static str = ns::GROUPS_DEFAULT_RIGHTS;

    fn header(&self) -> &IqHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut IqHeader {
        &mut self.header
    }

    fn write_child(&self, xml: &mut XmlBuilder) {
        xml.append_extension(&self.form);
    }
}
