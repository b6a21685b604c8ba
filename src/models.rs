pub mod usermodel;
pub mod providermodel;
pub mod requestmodel;
pub mod emergencymodel;
