pub mod carrier;

pub use carrier::{
    EpochGuard, NavContext, NavReturn, NavigateOptions, NavigationCarrier, DEFAULT_NAV_DEPTH,
};
