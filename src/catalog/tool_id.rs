//! Closed set of tool identifiers served by this crate.

use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::InvocationError;

macro_rules! tool_ids {
    ($($variant:ident => $name:literal,)+) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum ToolId {
            $($variant,)+
        }

        impl ToolId {
            pub const ALL: &'static [ToolId] = &[$(ToolId::$variant,)+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $(ToolId::$variant => $name,)+
                }
            }
        }

        impl FromStr for ToolId {
            type Err = InvocationError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($name => Ok(ToolId::$variant),)+
                    _ => Err(InvocationError::unknown_tool(value)),
                }
            }
        }
    };
}

tool_ids! {
    AuthenticatorRq => "authenticator_rq",
    BasketAddProductRq => "basket_add_product_rq",
    BasketConfirmRq => "basket_confirm_rq",
    BasketCreateRq => "basket_create_rq",
    BasketDelProductRq => "basket_del_product_rq",
    BasketDeleteRq => "basket_delete_rq",
    BasketLockRq => "basket_lock_rq",
    BasketPropertiesUpdateRq => "basket_properties_update_rq",
    BasketSummaryRq => "basket_summary_rq",
    BasketUnlockRq => "basket_unlock_rq",
    BudgetDeleteRq => "budget_delete_rq",
    BudgetDetailsRq => "budget_details_rq",
    BudgetPropertiesUpdateRq => "budget_properties_update_rq",
    BudgetSearchRq => "budget_search_rq",
    ChainInfoListDetailsRq => "chain_info_list_details_rq",
    HotelBoardDetailsRq => "hotel_board_details_rq",
    HotelCalendarAvailRq => "hotel_calendar_avail_rq",
    HotelDetailsRq => "hotel_details_rq",
    HotelInfoListDetailsRq => "hotel_info_list_details_rq",
    HotelInventoryReadRq => "hotel_inventory_read_rq",
    HotelInventoryUpdateRq => "hotel_inventory_update_rq",
    HotelOfferDetailsRq => "hotel_offer_details_rq",
    HotelPriceUpdateRq => "hotel_price_update_rq",
    HotelRateDetailsRq => "hotel_rate_details_rq",
    HotelRoomAvailRq => "hotel_room_avail_rq",
    HotelRoomDetailsRq => "hotel_room_details_rq",
    HotelRoomExtraAvailRq => "hotel_room_extra_avail_rq",
    HotelRoomExtraDetailsRq => "hotel_room_extra_details_rq",
    HotelSearchRq => "hotel_search_rq",
    GenericProductAvailRq => "generic_product_avail_rq",
    GenericProductDetailsRq => "generic_product_details_rq",
    GenericProductExtraAvailRq => "generic_product_extra_avail_rq",
    OrderCancelRq => "order_cancel_rq",
    OrderCreditCardRq => "order_credit_card_rq",
    OrderDataModifyRq => "order_data_modify_rq",
    OrderDetailsRq => "order_details_rq",
    OrderEventNotifyRq => "order_event_notify_rq",
    OrderEventReadRq => "order_event_read_rq",
    OrderEventSearchRq => "order_event_search_rq",
    OrderNotificationReadRq => "order_notification_read_rq",
    OrderNotificationRemoveRq => "order_notification_remove_rq",
    OrderNotificationRq => "order_notification_rq",
    OrderPaymentCreateRq => "order_payment_create_rq",
    OrderPutRq => "order_put_rq",
    OrderSearchRq => "order_search_rq",
    PackageAvailRq => "package_avail_rq",
    PackageCalendarAvailRq => "package_calendar_avail_rq",
    PackageDetailsRq => "package_details_rq",
    PackageExtraAvailRq => "package_extra_avail_rq",
    UserRewardsDetailsRq => "user_rewards_details_rq",
    ZoneSearchRq => "zone_search_rq",
}

impl fmt::Display for ToolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ToolId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ToolId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::ToolId;
    use crate::errors::ErrorKind;

    #[test]
    fn every_identifier_round_trips_through_its_name() {
        for id in ToolId::ALL {
            let parsed: ToolId = id.as_str().parse().expect("known tool name");
            assert_eq!(parsed, *id);
        }
    }

    #[test]
    fn names_are_unique() {
        let names: HashSet<_> = ToolId::ALL.iter().map(|id| id.as_str()).collect();
        assert_eq!(names.len(), 51);
        assert_eq!(ToolId::ALL.len(), 51);
    }

    #[test]
    fn unknown_name_is_rejected() {
        let error = "hotel_teleport_rq"
            .parse::<ToolId>()
            .expect_err("unknown tool must fail");
        assert_eq!(error.kind(), ErrorKind::UnknownTool);
    }

    #[test]
    fn deserializes_from_snake_case_name() {
        let id: ToolId = serde_json::from_str("\"hotel_search_rq\"").expect("valid id");
        assert_eq!(id, ToolId::HotelSearchRq);
        assert!(serde_json::from_str::<ToolId>("\"HotelSearchRQ\"").is_err());
    }
}
