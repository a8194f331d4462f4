// Endpoint groups, implemented as inherent methods on `ApiClient`.

mod control;
mod devices;
mod leaks;
mod readings;
