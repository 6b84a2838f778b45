//! Unpackers for the archives that come out of asset stores: Unity
//! `.unitypackage` files (gzip tar) and zip downloads described by a
//! sidecar JSON index.

pub mod booth;
pub mod process_log;
pub mod sanitize;
pub mod unitypackage;
