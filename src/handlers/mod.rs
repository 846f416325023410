pub mod bills;
pub mod deposits;
pub mod parties;
pub mod purchases;
pub mod reports;
pub mod sales;
pub mod settings;

pub use bills::{delete_bill, get_bill, reprint_bill, DeleteBillResponse, ReprintResponse};
pub use deposits::{
    create_deposit,
    update_deposit,
    CreateDepositRequest,
    UpdateDepositRequest,
    DepositResponse,
};
pub use parties::{
    create_party,
    get_party,
    list_parties,
    pending_payables,
    pending_receivables,
    update_party,
    CreatePartyRequest,
    UpdatePartyRequest,
};
pub use purchases::{
    create_purchase,
    update_purchase,
    CreatePurchaseRequest,
    UpdatePurchaseRequest,
    PurchaseResponse,
    UpdatePurchaseResponse,
};
pub use reports::{
    daily_report,
    inventory_value_report,
    monthly_report,
    outstanding_report,
    top_parties_report,
};
pub use sales::{
    create_sale,
    update_sale,
    CreateSaleRequest,
    UpdateSaleRequest,
    SaleResponse,
    UpdateSaleResponse,
};
pub use settings::{get_settings, update_setting, SettingResponse, UpdateSettingRequest};
