pub const STORE_TAG_OPEN: &str = "<kinestack version=";
pub const STORE_LAST_LINE: &str = "</kinestack>";
pub const HEADER_START: &str = "<header";
pub const HEADER_END: &str = "</header>";
pub const EVENT_START: &str = "<event";
pub const EVENT_END: &str = "</event>";
pub const SUMMARY_START: &str = "<summary";
pub const VERSION: &str = "1.0";

pub const HEADER_TAG: &str = "header";
pub const RUN_ATTR: &str = "run";
pub const FOLDER_ATTR: &str = "folder";
pub const NUMBER_ATTR: &str = "number";
pub const NTRACK_ATTR: &str = "ntrack";
pub const NPRIMARY_ATTR: &str = "nprimary";
