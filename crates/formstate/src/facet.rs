//! Boolean facets and the status they roll up into.

use serde::{Deserialize, Serialize};

use crate::prop::Prop;

/// One boolean status dimension of a control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Facet {
    Disabled,
    Touched,
    Dirty,
    Readonly,
    Submitted,
    Pending,
}

impl Facet {
    pub const ALL: [Facet; 6] = [
        Facet::Disabled,
        Facet::Touched,
        Facet::Dirty,
        Facet::Readonly,
        Facet::Submitted,
        Facet::Pending,
    ];

    /// The control's own flag.
    pub fn self_prop(self) -> Prop {
        match self {
            Facet::Disabled => Prop::SelfDisabled,
            Facet::Touched => Prop::SelfTouched,
            Facet::Dirty => Prop::SelfDirty,
            Facet::Readonly => Prop::SelfReadonly,
            Facet::Submitted => Prop::SelfSubmitted,
            Facet::Pending => Prop::SelfPending,
        }
    }

    /// True if any contributing child has the facet.
    pub fn child_prop(self) -> Prop {
        match self {
            Facet::Disabled => Prop::ChildDisabled,
            Facet::Touched => Prop::ChildTouched,
            Facet::Dirty => Prop::ChildDirty,
            Facet::Readonly => Prop::ChildReadonly,
            Facet::Submitted => Prop::ChildSubmitted,
            Facet::Pending => Prop::ChildPending,
        }
    }

    /// True if every contributing child has the facet.
    pub fn children_prop(self) -> Prop {
        match self {
            Facet::Disabled => Prop::ChildrenDisabled,
            Facet::Touched => Prop::ChildrenTouched,
            Facet::Dirty => Prop::ChildrenDirty,
            Facet::Readonly => Prop::ChildrenReadonly,
            Facet::Submitted => Prop::ChildrenSubmitted,
            Facet::Pending => Prop::ChildrenPending,
        }
    }

    /// The combined view under the plain facet name.
    pub fn prop(self) -> Prop {
        match self {
            Facet::Disabled => Prop::Disabled,
            Facet::Touched => Prop::Touched,
            Facet::Dirty => Prop::Dirty,
            Facet::Readonly => Prop::Readonly,
            Facet::Submitted => Prop::Submitted,
            Facet::Pending => Prop::Pending,
        }
    }

    /// Whether the combined flag follows "all children" rather than "any
    /// child". A group is disabled, readonly or submitted only once every
    /// child is; it is touched, dirty or pending as soon as one child is.
    pub fn combines_all(self) -> bool {
        matches!(self, Facet::Disabled | Facet::Readonly | Facet::Submitted)
    }

    /// Disabled children drop out of every facet except disabled itself.
    pub(crate) fn counts_disabled_children(self) -> bool {
        self == Facet::Disabled
    }
}

/// One boolean per facet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FacetFlags {
    pub disabled: bool,
    pub touched: bool,
    pub dirty: bool,
    pub readonly: bool,
    pub submitted: bool,
    pub pending: bool,
}

impl FacetFlags {
    pub fn get(&self, facet: Facet) -> bool {
        match facet {
            Facet::Disabled => self.disabled,
            Facet::Touched => self.touched,
            Facet::Dirty => self.dirty,
            Facet::Readonly => self.readonly,
            Facet::Submitted => self.submitted,
            Facet::Pending => self.pending,
        }
    }

    pub fn set(&mut self, facet: Facet, value: bool) {
        match facet {
            Facet::Disabled => self.disabled = value,
            Facet::Touched => self.touched = value,
            Facet::Dirty => self.dirty = value,
            Facet::Readonly => self.readonly = value,
            Facet::Submitted => self.submitted = value,
            Facet::Pending => self.pending = value,
        }
    }

    pub fn with(mut self, facet: Facet, value: bool) -> Self {
        self.set(facet, value);
        self
    }
}

/// Roll-up of a control's state, by priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlStatus {
    Disabled,
    Pending,
    Invalid,
    Valid,
}

impl ControlStatus {
    /// `DISABLED > PENDING > INVALID > VALID`.
    pub fn derive(disabled: bool, pending: bool, invalid: bool) -> Self {
        if disabled {
            ControlStatus::Disabled
        } else if pending {
            ControlStatus::Pending
        } else if invalid {
            ControlStatus::Invalid
        } else {
            ControlStatus::Valid
        }
    }
}
