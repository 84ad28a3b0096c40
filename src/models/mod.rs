pub mod accounting;
pub mod invoice_status;
pub mod metadata;
pub mod result;
pub mod sale;
pub mod stock_movement;

pub use accounting::{
    first_success, value_is_success, AccountingResponse, CashioPayment, CustomerPayload,
    DocumentAction, PaymentOutcome, PaymentRequest, SalesDocumentLine, SalesDocumentPayload,
};
pub use invoice_status::{InvoiceStatus, InvoiceStatusRecord};
pub use metadata::{CardSerial, DepartmentInfo, EmployeeStatus, PlatformFee, ProductInfo, WarehouseMapping};
pub use result::{HandlerOutcome, ProcessResult};
pub use sale::{Order, ProductType, SaleLine};
pub use stock_movement::{MatchedMovements, MovementKind, StockMovementRecord};
